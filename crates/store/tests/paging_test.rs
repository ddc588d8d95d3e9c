//! Paging properties of the mirror store.
//!
//! Concatenating every page of a listing must reproduce the unpaged listing,
//! whatever the page size and order.

use std::collections::BTreeSet;

use mirror_core::{Conditions, Order, OrderField, Paging, ResourceKind};
use mirror_store::testing::deployment_row;
use mirror_store::{
    InMemoryMirrorStore, MirrorRow, MirrorStore, StoreConfig, StoreResult, SurrealMirrorStore,
};
use proptest::prelude::*;

fn order_strategy() -> impl Strategy<Value = Order> {
    (
        prop_oneof![
            Just(OrderField::Name),
            Just(OrderField::CreatedAt),
            Just(OrderField::UpdatedAt),
            Just(OrderField::Status),
        ],
        any::<bool>(),
    )
        .prop_map(|(field, descending)| Order { field, descending })
}

fn rows_strategy() -> impl Strategy<Value = Vec<(String, String, i64)>> {
    proptest::collection::btree_set("[a-z]{1,6}", 0..25).prop_flat_map(|names| {
        let names: Vec<String> = names.into_iter().collect();
        let n = names.len();
        (
            Just(names),
            proptest::collection::vec(
                prop_oneof![Just("running"), Just("stopped"), Just("updating")],
                n,
            ),
            proptest::collection::vec(0i64..5, n),
        )
            .prop_map(|(names, statuses, times)| {
                names
                    .into_iter()
                    .zip(statuses)
                    .zip(times)
                    .map(|((name, status), t)| (name, status.to_string(), t))
                    .collect()
            })
    })
}

async fn pages_concatenated(
    store: &dyn MirrorStore,
    conditions: &Conditions,
    limit: usize,
    order: Order,
) -> StoreResult<(usize, Vec<MirrorRow>)> {
    let mut all = Vec::new();
    let mut offset = 0;
    let mut reported_total = 0;
    loop {
        let (total, page) = store
            .list(
                ResourceKind::Deployment,
                conditions,
                Some(Paging::new(limit, offset)),
                order,
            )
            .await?;
        reported_total = total;
        if page.is_empty() {
            break;
        }
        offset += page.len();
        all.extend(page);
    }
    Ok((reported_total, all))
}

type Listing = (usize, Vec<MirrorRow>);

/// Fill `store` with `rows`, then return the unpaged listing and the
/// concatenation of every page.
async fn full_and_paged(
    store: &dyn MirrorStore,
    rows: &[(String, String, i64)],
    conditions: &Conditions,
    limit: usize,
    order: Order,
) -> StoreResult<(Listing, Listing)> {
    store.reset(ResourceKind::Deployment).await?;
    for (name, status, t) in rows {
        store.insert(&deployment_row("default", name, status, *t)).await?;
    }
    let full = store
        .list(ResourceKind::Deployment, conditions, None, order)
        .await?;
    let paged = pages_concatenated(store, conditions, limit, order).await?;
    Ok((full, paged))
}

fn check_listings(outcome: StoreResult<(Listing, Listing)>) -> Result<(), TestCaseError> {
    let ((full_total, full), (paged_total, paged)) =
        outcome.map_err(|e| TestCaseError::fail(e.to_string()))?;

    prop_assert_eq!(full_total, full.len());
    prop_assert_eq!(paged_total, full_total);
    prop_assert_eq!(&paged, &full);

    let distinct: BTreeSet<_> = paged.iter().map(|r| r.key.clone()).collect();
    prop_assert_eq!(distinct.len(), paged.len());
    Ok(())
}

fn conditions_for(filter_stopped: bool) -> Conditions {
    if filter_stopped {
        Conditions::new().with("status", "stopped")
    } else {
        Conditions::new()
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pages_concatenate_to_full_listing(
        rows in rows_strategy(),
        limit in 1usize..7,
        order in order_strategy(),
        filter_stopped in any::<bool>(),
    ) {
        let conditions = conditions_for(filter_stopped);
        let outcome = runtime()?.block_on(async {
            let store = InMemoryMirrorStore::new();
            full_and_paged(&store, &rows, &conditions, limit, order).await
        });
        check_listings(outcome)?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_surreal_pages_concatenate_to_full_listing(
        rows in rows_strategy(),
        limit in 1usize..7,
        order in order_strategy(),
        filter_stopped in any::<bool>(),
    ) {
        let conditions = conditions_for(filter_stopped);
        let outcome = runtime()?.block_on(async {
            let store = SurrealMirrorStore::connect(&StoreConfig::in_memory()).await?;
            full_and_paged(&store, &rows, &conditions, limit, order).await
        });
        check_listings(outcome)?;
    }
}
