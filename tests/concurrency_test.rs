mod common;

use common::TestApp;
use garmentflow_api::{
    entities::OrderStatus, errors::ServiceError, services::lifecycle::TransitionRequest,
};
use rust_decimal_macros::dec;

const ROUNDS: usize = 30;

fn lost_race(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::Conflict(_) | ServiceError::IllegalTransition { .. }
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_decisions_on_a_shared_pool_apply_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::file_backed(&dir, 8).await;
    let manager = app.manager().await;
    let admin = app.admin().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Duffle Coat", dec!(80.00), 100, 1).await;

    for round in 0..ROUNDS {
        let order = app.place_order(&buyer, product.id, 1).await;

        let approve = {
            let lifecycle = app.services().lifecycle.clone();
            let caller = manager.caller.clone();
            tokio::spawn(async move { lifecycle.approve(&caller, order.id).await })
        };
        let reject = {
            let lifecycle = app.services().lifecycle.clone();
            let caller = admin.caller.clone();
            tokio::spawn(async move { lifecycle.reject(&caller, order.id, None).await })
        };
        let results = [approve.await.unwrap(), reject.await.unwrap()];

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "round {round}: {results:?}");
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(lost_race(err), "round {round}: unexpected error {err:?}");
        }

        let stored = app.services().orders.get(order.id).await.unwrap();
        assert_eq!(stored.status, winners[0].order.status);
        assert_eq!(stored.version, 2);

        let ledger = app.services().tracking.get_ledger(order.id).await.unwrap();
        assert_eq!(ledger.checkpoints.len(), 2, "round {round}");
        assert_eq!(ledger.latest().unwrap().status, stored.status);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn progress_notes_never_leave_status_and_ledger_apart() {
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::file_backed(&dir, 8).await;
    let manager = app.manager().await;
    let admin = app.admin().await;
    let buyer = app.buyer().await;
    let product = app.seed_product(&manager, "Kilt", dec!(64.00), 100, 1).await;

    for round in 0..ROUNDS {
        let order = app.place_order(&buyer, product.id, 1).await;
        let lifecycle = &app.services().lifecycle;
        lifecycle.approve(&manager.caller, order.id).await.unwrap();
        lifecycle
            .transition(&manager.caller, order.id, TransitionRequest::to(OrderStatus::Cutting))
            .await
            .unwrap();

        let note = {
            let lifecycle = lifecycle.clone();
            let caller = manager.caller.clone();
            tokio::spawn(async move {
                let request = TransitionRequest::to(OrderStatus::Cutting).with_notes("Half the panels cut");
                lifecycle.record_progress(&caller, order.id, request).await
            })
        };
        let advance = {
            let lifecycle = lifecycle.clone();
            let caller = admin.caller.clone();
            tokio::spawn(async move {
                lifecycle
                    .transition(&caller, order.id, TransitionRequest::to(OrderStatus::Sewing))
                    .await
            })
        };
        let (note, advance) = (note.await.unwrap(), advance.await.unwrap());

        if let Err(err) = &note {
            assert!(lost_race(err), "round {round}: unexpected error {err:?}");
        }
        if let Err(err) = &advance {
            assert!(lost_race(err), "round {round}: unexpected error {err:?}");
        }

        let stored = app.services().orders.get(order.id).await.unwrap();
        let ledger = app.services().tracking.get_ledger(order.id).await.unwrap();
        assert_eq!(ledger.latest().unwrap().status, stored.status, "round {round}");
        let appended = [note.is_ok(), advance.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(ledger.checkpoints.len(), 3 + appended, "round {round}");
    }
}
