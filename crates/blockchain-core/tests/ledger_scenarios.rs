// blockchain-core/tests/ledger_scenarios.rs

use blockchain_core::*;
use blockchain_crypto::{KeyPair, Secp256k1Signer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn signed_batch(keypair: &KeyPair, count: usize) -> Vec<Transaction> {
    (0..count)
        .map(|i| {
            let mut tx = Transaction::with_timestamp(
                keypair.public_key().to_pem(),
                "recipient",
                i as f64 + 1.0,
                now() + i as f64,
            );
            tx.sign(keypair).unwrap();
            tx
        })
        .collect()
}

fn counting_ledger(difficulty: Difficulty) -> (Arc<Ledger>, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let listener: ChainListener = Arc::new(move |_chain: Arc<Chain>| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let config = LedgerConfig {
        difficulty,
        ..Default::default()
    };
    let ledger = Ledger::new(config, Arc::new(Secp256k1Signer), Some(listener)).unwrap();
    (ledger, fired)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn threshold_triggers_mining_and_broadcast() {
    let (ledger, fired) = counting_ledger(2);
    let keypair = KeyPair::generate().unwrap();

    for tx in signed_batch(&keypair, 5) {
        assert_eq!(ledger.submit_transaction(tx).unwrap(), SubmitOutcome::Accepted);
    }

    assert!(wait_until(|| ledger.chain().len() == 2 && !ledger.is_mining()));
    let chain = ledger.chain();
    assert!(chain.validate(2).is_ok());
    assert_eq!(chain.tip().transactions.len(), 5);
    assert!(chain.tip().hash.starts_with("00"));
    assert!(ledger.mempool().is_empty());
    let metrics = ledger.pool_metrics();
    assert_eq!((metrics.total_added, metrics.total_removed), (5, 5));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn shorter_ledger_adopts_longer_chain() {
    let (l1, _) = counting_ledger(2);
    let (l2, _) = counting_ledger(2);
    let keypair = KeyPair::generate().unwrap();

    for tx in signed_batch(&keypair, 5) {
        l1.submit_transaction(tx).unwrap();
    }
    assert!(wait_until(|| l1.chain().len() == 2));
    assert_eq!(l2.chain().len(), 1);

    let outcome = l2.compare_and_replace(l1.chain().to_blocks()).unwrap();
    assert!(outcome.is_replaced());
    assert_eq!(*l2.chain(), *l1.chain());

    // offering it again is a no-op
    assert_eq!(
        l2.compare_and_replace(l1.chain().to_blocks()).unwrap(),
        ReplaceOutcome::Kept
    );
}

/// Difficulty the in-flight miner cannot reach before the test replaces
/// its chain (expected 16^7 hashes).
const SLOW_DIFFICULTY: Difficulty = 7;

/// Genesis plus one block sealed at `SLOW_DIFFICULTY`, found offline
fn slow_candidate() -> Vec<Block> {
    let genesis = Block::genesis();
    let mut block = Block::new(1, genesis.hash.clone(), 1_700_000_000.0, vec![]);
    block.nonce = 61_261_499;
    block.hash = block.compute_hash();
    assert_eq!(
        block.hash,
        "00000005ff4f97a1ae8a7652b6141fd66777d78295d781a7a2b5ee11c1523e4d"
    );
    vec![genesis, block]
}

#[test]
fn longer_chain_preempts_mining() {
    let (ledger, fired) = counting_ledger(SLOW_DIFFICULTY);
    let keypair = KeyPair::generate().unwrap();
    let candidate = slow_candidate();

    for tx in signed_batch(&keypair, 5) {
        ledger.submit_transaction(tx).unwrap();
    }
    assert!(ledger.is_mining());

    let outcome = ledger.compare_and_replace(candidate.clone()).unwrap();
    assert_eq!(
        outcome,
        ReplaceOutcome::Replaced {
            previous_len: 1,
            new_len: 2,
            cancelled_mining: true,
            reconciled: 0,
        }
    );
    assert!(!ledger.is_mining());

    // give the cancelled miner time to observe the token and report back
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(ledger.chain().blocks(), &candidate[..]);
    assert_eq!(ledger.mempool().len(), 5);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn stopped_mining_leaves_chain_untouched() {
    let (ledger, fired) = counting_ledger(64);
    let keypair = KeyPair::generate().unwrap();

    for tx in signed_batch(&keypair, 5) {
        ledger.submit_transaction(tx).unwrap();
    }
    assert!(ledger.is_mining());

    ledger.stop_mining();
    assert!(!ledger.is_mining());
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(ledger.chain().len(), 1);
    assert_eq!(ledger.mempool().len(), 5);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn resubmission_is_idempotent() {
    let (ledger, _) = counting_ledger(2);
    let keypair = KeyPair::generate().unwrap();
    let tx = signed_batch(&keypair, 1).remove(0);

    let mut resigned = tx.clone();
    resigned.sign(&keypair).unwrap();

    ledger.submit_transaction(tx).unwrap();
    assert_eq!(
        ledger.submit_transaction(resigned).unwrap(),
        SubmitOutcome::Duplicate
    );
    assert_eq!(ledger.mempool().len(), 1);
}
