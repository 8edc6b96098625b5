//! # End-to-End Escrow Scenarios
//!
//! Funds move from a treasury into the ledger and back out to the parties.
//! Every scenario ends by checking that no value was created or destroyed.

use std::sync::Arc;

use tlock_core::{Address, EntryId, EpochMillis, ManualClock};
use tlock_escrow::{
    Coin, EscrowError, EscrowLedger, EscrowStatus, InMemoryTreasury, MemorySink, Treasury,
};

struct World {
    ledger: EscrowLedger<Arc<ManualClock>, Arc<MemorySink>>,
    clock: Arc<ManualClock>,
    sink: Arc<MemorySink>,
    treasury: InMemoryTreasury,
    alice: Address,
    bob: Address,
    carol: Address,
}

impl World {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(0u64));
        let sink = Arc::new(MemorySink::new());
        let treasury = InMemoryTreasury::new();
        let alice = Address::new("alice").unwrap();
        let bob = Address::new("bob").unwrap();
        let carol = Address::new("carol").unwrap();
        treasury.transfer_to(&alice, Coin::mint(50_000)).unwrap();
        treasury.transfer_to(&carol, Coin::mint(5_000)).unwrap();
        Self {
            ledger: EscrowLedger::new(clock.clone(), sink.clone()),
            clock,
            sink,
            treasury,
            alice,
            bob,
            carol,
        }
    }

    fn lock(&self, amount: u64, unlock: u64) -> EntryId {
        let deposit = self.treasury.withdraw(&self.alice, amount).unwrap();
        self.ledger
            .create_payment(
                deposit,
                self.bob.clone(),
                EpochMillis::new(unlock),
                "milestone 1".to_string(),
                self.alice.clone(),
            )
            .unwrap()
    }

    fn at(&self, ms: u64) {
        self.clock.set(EpochMillis::new(ms));
    }

    fn conserved(&self) -> u128 {
        self.treasury.total() + self.ledger.total_custodied()
    }
}

#[test]
fn recipient_claims_after_unlock() {
    let world = World::new();
    let id = world.lock(10_000, 1000);
    assert_eq!(world.treasury.balance_of(&world.alice), 40_000);

    world.at(999);
    let err = world.ledger.claim_payment(id, &world.bob).unwrap_err();
    assert!(matches!(err, EscrowError::NotYetUnlocked { .. }));

    world.at(1000);
    let payout = world.ledger.claim_payment(id, &world.bob).unwrap();
    world.treasury.transfer_to(&world.bob, payout).unwrap();

    assert_eq!(world.treasury.balance_of(&world.bob), 10_000);
    let info = world.ledger.get_payment_info(id).unwrap();
    assert_eq!(info.status, EscrowStatus::Completed);
    assert_eq!(info.balance, 0);
    assert_eq!(world.conserved(), 55_000);
}

#[test]
fn owner_cancels_before_unlock() {
    let world = World::new();
    let id = world.lock(10_000, 1000);

    world.at(500);
    let refund = world.ledger.cancel_payment(id, &world.alice).unwrap();
    world.treasury.transfer_to(&world.alice, refund).unwrap();
    assert_eq!(world.treasury.balance_of(&world.alice), 50_000);

    world.at(5000);
    let err = world.ledger.claim_payment(id, &world.bob).unwrap_err();
    assert!(matches!(
        err,
        EscrowError::AlreadyFinalized {
            status: EscrowStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(world.treasury.balance_of(&world.bob), 0);
    assert_eq!(world.conserved(), 55_000);
}

#[test]
fn third_party_top_up_is_paid_out() {
    let world = World::new();
    let id = world.lock(10_000, 1000);

    let top_up = world.treasury.withdraw(&world.carol, 500).unwrap();
    world.ledger.add_funds(id, top_up, &world.carol).unwrap();
    assert_eq!(world.ledger.get_payment_info(id).unwrap().balance, 10_500);

    world.at(1000);
    let payout = world.ledger.claim_payment(id, &world.bob).unwrap();
    assert_eq!(payout.value(), 10_500);
    world.treasury.transfer_to(&world.bob, payout).unwrap();
    assert_eq!(world.conserved(), 55_000);
}

#[test]
fn rejected_top_up_goes_back_to_funder() {
    let world = World::new();
    let id = world.lock(10_000, 1000);
    world.at(1000);
    let payout = world.ledger.claim_payment(id, &world.bob).unwrap();
    world.treasury.transfer_to(&world.bob, payout).unwrap();

    let late = world.treasury.withdraw(&world.carol, 700).unwrap();
    let rejected = world.ledger.add_funds(id, late, &world.carol).unwrap_err();
    let (err, deposit) = rejected.into_parts();
    assert!(matches!(err, EscrowError::AlreadyFinalized { .. }));
    world.treasury.transfer_to(&world.carol, deposit).unwrap();

    assert_eq!(world.treasury.balance_of(&world.carol), 5_000);
    assert_eq!(world.conserved(), 55_000);
}

#[test]
fn rescheduling_shifts_both_windows() {
    let world = World::new();
    let id = world.lock(10_000, 1000);

    world.at(900);
    world
        .ledger
        .update_schedule(id, EpochMillis::new(3000), &world.alice)
        .unwrap();

    world.at(1500);
    assert!(!world.ledger.is_payment_claimable(id).unwrap());
    assert!(matches!(
        world.ledger.claim_payment(id, &world.bob),
        Err(EscrowError::NotYetUnlocked { .. })
    ));

    world.at(3000);
    assert!(world.ledger.is_payment_claimable(id).unwrap());
    assert!(matches!(
        world.ledger.cancel_payment(id, &world.alice),
        Err(EscrowError::AlreadyUnlocked { .. })
    ));
    assert!(world.ledger.claim_payment(id, &world.bob).is_ok());
}

#[test]
fn reschedule_into_past_rejected() {
    let world = World::new();
    let id = world.lock(10_000, 1000);
    world.at(600);
    let err = world
        .ledger
        .update_schedule(id, EpochMillis::new(600), &world.alice)
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidSchedule { .. }));
    assert_eq!(
        world.ledger.get_payment_info(id).unwrap().unlock_time,
        EpochMillis::new(1000)
    );
}

#[test]
fn independent_entries_do_not_interfere() {
    let world = World::new();
    let first = world.lock(1_000, 1000);
    let second = world.lock(2_000, 2000);

    world.at(1500);
    let payout = world.ledger.claim_payment(first, &world.bob).unwrap();
    assert_eq!(payout.value(), 1_000);
    let refund = world.ledger.cancel_payment(second, &world.alice).unwrap();
    assert_eq!(refund.value(), 2_000);

    assert_eq!(world.sink.records_for(first).len(), 2);
    assert_eq!(world.sink.records_for(second).len(), 2);
    assert_eq!(world.ledger.entries_payable_to(&world.bob), vec![first, second]);
    world.treasury.transfer_to(&world.bob, payout).unwrap();
    world.treasury.transfer_to(&world.alice, refund).unwrap();
    assert_eq!(world.conserved(), 55_000);
}

#[test]
fn exported_snapshot_reflects_final_state() {
    let world = World::new();
    let id = world.lock(4_000, 1000);
    world.at(10);
    let _refund = world.ledger.cancel_payment(id, &world.alice).unwrap();

    let json = world.ledger.export_entry(id).unwrap();
    assert_eq!(json["status"], "CANCELLED");
    assert_eq!(json["custodied_amount"], 0);
    assert_eq!(json["description"], "milestone 1");
    assert_eq!(world.ledger.description(id).unwrap(), "milestone 1");
}
