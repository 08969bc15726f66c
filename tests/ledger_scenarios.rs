use pow_ledger::blockchain::codec::hash_block_fields;
use pow_ledger::transaction::{OutPoint, build_transfer};
use pow_ledger::wallet::{decode_address, verify_signature};
use pow_ledger::{GenesisPolicy, Ledger, LedgerError, ProofOfWork, UtxoSet, Wallet};

const BITS: u32 = 8;

fn ledger_for(owner: &Wallet, reward: u64, policy: GenesisPolicy) -> Ledger {
    let db = sled::Config::new().temporary(true).open().unwrap();
    Ledger::create(db, &owner.address(), reward, ProofOfWork::new(BITS), policy).unwrap()
}

#[test]
fn genesis_reward_then_transfer() {
    let a = Wallet::new();
    let b = Wallet::new();
    let ledger = ledger_for(&a, 10, GenesisPolicy::Mined);
    assert_eq!(ledger.balance(&a.address()).unwrap(), 10);

    ledger.send(&a, &b.address(), 4).unwrap();
    let balance_a = ledger.balance(&a.address()).unwrap();
    let balance_b = ledger.balance(&b.address()).unwrap();
    assert_eq!((balance_a, balance_b), (6, 4));
    assert_eq!(balance_a + balance_b, 10);

    let a_outputs = ledger.unspent_outputs(&a.address()).unwrap();
    let b_outputs = ledger.unspent_outputs(&b.address()).unwrap();
    assert_eq!(a_outputs.len(), 1);
    assert_eq!(a_outputs[0].1.value, 6);
    assert_eq!(b_outputs.len(), 1);
    assert_eq!(b_outputs[0].1.value, 4);
    assert_eq!(ledger.utxo_snapshot().len(), 2);
}

#[test]
fn overspend_appends_nothing() {
    let a = Wallet::new();
    let b = Wallet::new();
    let ledger = ledger_for(&a, 10, GenesisPolicy::Mined);
    ledger.send(&a, &b.address(), 4).unwrap();
    let tip = ledger.tip();
    let height = ledger.height().unwrap();

    let err = ledger.send(&a, &b.address(), 100).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            requested: 100,
            available: 6
        }
    ));
    assert_eq!(ledger.tip(), tip);
    assert_eq!(ledger.height().unwrap(), height);
}

#[test]
fn every_block_hash_is_recomputable_and_meets_target() {
    let a = Wallet::new();
    let b = Wallet::new();
    let ledger = ledger_for(&a, 10, GenesisPolicy::Mined);
    ledger.send(&a, &b.address(), 1).unwrap();
    ledger.send(&b, &a.address(), 1).unwrap();

    let pow = ProofOfWork::new(BITS);
    let target = pow.target().unwrap();
    for block in ledger.blocks() {
        let block = block.unwrap();
        let recomputed =
            hash_block_fields(&block.prev_hash, &block.transactions, block.timestamp, block.nonce)
                .unwrap();
        assert_eq!(recomputed, block.hash);
        assert!(block.hash < target);
    }
}

#[test]
fn iteration_is_finite_and_repeatable() {
    let a = Wallet::new();
    let b = Wallet::new();
    let ledger = ledger_for(&a, 10, GenesisPolicy::Exempt);
    for _ in 0..3 {
        ledger.send(&a, &b.address(), 1).unwrap();
    }
    let height = ledger.height().unwrap();
    let first: Vec<_> = ledger.blocks().map(|b| b.unwrap().hash).collect();
    let second: Vec<_> = ledger.blocks().map(|b| b.unwrap().hash).collect();
    assert_eq!(first.len() as u64, height + 1);
    assert_eq!(first, second);
    assert_eq!(first.first(), Some(&ledger.tip()));
}

#[test]
fn reindex_agrees_with_incremental_updates() {
    let a = Wallet::new();
    let b = Wallet::new();
    let c = Wallet::new();
    let ledger = ledger_for(&a, 10, GenesisPolicy::Mined);
    ledger.send(&a, &b.address(), 7).unwrap();
    ledger.send(&b, &c.address(), 2).unwrap();
    ledger.send(&a, &c.address(), 3).unwrap();

    let incremental = ledger.utxo_snapshot();
    let tip_to_genesis = UtxoSet::reindex(ledger.blocks()).unwrap();
    let mut blocks: Vec<_> = ledger.blocks().collect();
    blocks.reverse();
    let genesis_to_tip = UtxoSet::reindex(blocks).unwrap();

    assert_eq!(incremental, tip_to_genesis);
    assert_eq!(incremental, genesis_to_tip);
    assert_eq!(incremental.balance(&decode_address(&c.address()).unwrap()), 5);
}

#[test]
fn built_transaction_signatures_verify() {
    let a = Wallet::new();
    let b = Wallet::new();
    let ledger = ledger_for(&a, 10, GenesisPolicy::Mined);
    ledger.send(&b, &a.address(), 1).unwrap_err();
    let utxo = ledger.utxo_snapshot();
    let tx = build_transfer(&a, &b.address(), 3, &utxo).unwrap();

    for input in &tx.inputs {
        assert!(verify_signature(&input.pubkey, &input.signature, &tx.id));
        let mut flipped = tx.id;
        flipped[0] ^= 0x80;
        assert!(!verify_signature(&input.pubkey, &input.signature, &flipped));
    }
    assert!(utxo.contains(&OutPoint::new(tx.inputs[0].outpoint.txid, 0)));
}
