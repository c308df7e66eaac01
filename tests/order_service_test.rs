use chrono::Utc;
use order_authority::clients::{CatalogError, DirectoryError, MockProductCatalog, MockUserDirectory};
use order_authority::model::{
    ItemRequest, Money, OrderId, OrderStatus, ProductId, User, UserId, ValidatedProduct,
    ValidationResult,
};
use order_authority::service::{OrderError, OrderService, UserEnrichment};
use order_authority::store::{InMemoryOrderStore, OrderStore};
use order_framework::Deadline;
use std::sync::Arc;
use std::time::Duration;

/// Real orchestrator and in-memory store, scripted remote authorities.
struct Harness {
    service: OrderService,
    store: Arc<InMemoryOrderStore>,
    catalog: MockProductCatalog,
    users: MockUserDirectory,
}

fn harness() -> Harness {
    harness_with(
        InMemoryOrderStore::new(),
        MockProductCatalog::new(),
        MockUserDirectory::new(),
    )
}

fn harness_with(
    store: InMemoryOrderStore,
    catalog: MockProductCatalog,
    users: MockUserDirectory,
) -> Harness {
    let store = Arc::new(store);
    let service = OrderService::new(
        store.clone(),
        Arc::new(catalog.clone()),
        Arc::new(users.clone()),
    );
    Harness {
        service,
        store,
        catalog,
        users,
    }
}

fn widget(price: f64) -> ValidationResult {
    ValidationResult {
        valid: true,
        products: vec![ValidatedProduct {
            product_id: ProductId::from("p1"),
            price,
            name: "Widget".to_string(),
        }],
    }
}

fn alice() -> User {
    let now = Utc::now();
    User {
        id: UserId::from("u1"),
        email: "alice@example.com".to_string(),
        name: "Alice".to_string(),
        role: "customer".to_string(),
        created_at: now,
        updated_at: now,
    }
}

async fn place(h: &Harness, user: &str) -> order_authority::model::Order {
    h.catalog.expect_validate().return_ok(widget(9.99));
    h.service
        .create_order(UserId::from(user), vec![ItemRequest::new("p1", 1)], Deadline::none())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_order_prices_from_authority() {
    let h = harness();
    h.catalog.expect_validate().return_ok(widget(9.99));

    let order = h
        .service
        .create_order(UserId::from("u1"), vec![ItemRequest::new("p1", 2)], Deadline::none())
        .await
        .unwrap();

    assert_eq!(order.total, Money::from_cents(1998));
    assert_eq!(order.total.to_string(), "19.98");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);
    let item = &order.items[0];
    assert_eq!(item.product_id, ProductId::from("p1"));
    assert_eq!(item.quantity, 2);
    assert_eq!(item.price, Money::from_cents(999));
    assert_eq!(item.product_name, "Widget");

    assert_eq!(h.catalog.calls(), vec![vec![ItemRequest::new("p1", 2)]]);
    h.catalog.verify();
}

#[tokio::test]
async fn test_total_sums_every_line() {
    let h = harness();
    h.catalog.expect_validate().return_ok(ValidationResult {
        valid: true,
        products: vec![
            ValidatedProduct {
                product_id: ProductId::from("p1"),
                price: 9.99,
                name: "Widget".to_string(),
            },
            ValidatedProduct {
                product_id: ProductId::from("p2"),
                price: 24.50,
                name: "Gadget".to_string(),
            },
        ],
    });

    let order = h
        .service
        .create_order(
            UserId::from("u1"),
            vec![ItemRequest::new("p1", 3), ItemRequest::new("p2", 2)],
            Deadline::none(),
        )
        .await
        .unwrap();

    // 3 x 9.99 + 2 x 24.50
    assert_eq!(order.total, Money::from_cents(7897));
    assert_eq!(order.items[1].product_name, "Gadget");
}

#[tokio::test]
async fn test_get_order_returns_persisted_items_with_user() {
    let h = harness();
    let created = place(&h, "u1").await;
    h.users.expect_get_user("u1").return_ok(alice());

    let details = h.service.get_order(&created.id, Deadline::none()).await.unwrap();

    assert_eq!(details.order, created);
    assert_eq!(details.user().map(|u| u.name.as_str()), Some("Alice"));
    h.users.verify();
}

#[tokio::test]
async fn test_enrichment_failure_still_returns_order() {
    let h = harness();
    let created = place(&h, "u1").await;
    h.users
        .expect_get_user("u1")
        .return_err(DirectoryError::Unavailable("connection refused".to_string()));

    let details = h.service.get_order(&created.id, Deadline::none()).await.unwrap();

    assert_eq!(details.order.items, created.items);
    assert!(matches!(details.user, UserEnrichment::Unavailable { .. }));
    assert!(details.user().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_enrichment_is_cut_off_by_deadline() {
    let users = MockUserDirectory::new().with_delay(Duration::from_secs(30));
    let h = harness_with(InMemoryOrderStore::new(), MockProductCatalog::new(), users);
    let created = place(&h, "u1").await;

    let details = h
        .service
        .get_order(&created.id, Deadline::after(Duration::from_millis(100)))
        .await
        .unwrap();

    assert_eq!(details.order.id, created.id);
    assert!(details.user().is_none());
    assert_eq!(h.users.call_count(), 0);
}

#[tokio::test]
async fn test_get_blank_id_is_invalid_argument() {
    let h = harness();
    let result = h.service.get_order(&OrderId::from("  "), Deadline::none()).await;
    assert!(matches!(result, Err(OrderError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_get_unknown_order_is_not_found() {
    let h = harness();
    let result = h.service.get_order(&OrderId::from("missing"), Deadline::none()).await;
    assert!(matches!(result, Err(OrderError::NotFound(_))));
}

#[tokio::test]
async fn test_invalid_items_persist_nothing() {
    let h = harness();
    h.catalog.expect_validate().return_ok(ValidationResult {
        valid: false,
        products: vec![],
    });

    let result = h
        .service
        .create_order(UserId::from("u1"), vec![ItemRequest::new("p1", 500)], Deadline::none())
        .await;

    assert!(matches!(result, Err(OrderError::ValidationFailed(_))));
    assert_eq!(h.store.row_counts().unwrap(), (0, 0));
}

#[tokio::test]
async fn test_missing_product_fails_closed() {
    let h = harness();
    // p2 was requested but the authority only answered for p1.
    h.catalog.expect_validate().return_ok(widget(9.99));

    let result = h
        .service
        .create_order(
            UserId::from("u1"),
            vec![ItemRequest::new("p1", 1), ItemRequest::new("p2", 1)],
            Deadline::none(),
        )
        .await;

    match result {
        Err(OrderError::ValidationFailed(message)) => assert!(message.contains("p2")),
        other => panic!("Expected ValidationFailed, got {other:?}"),
    }
    assert_eq!(h.store.row_counts().unwrap(), (0, 0));
}

#[tokio::test]
async fn test_unreachable_authority_is_validation_failure() {
    let h = harness();
    h.catalog
        .expect_validate()
        .return_err(CatalogError::Unavailable("connection refused".to_string()));

    let result = h
        .service
        .create_order(UserId::from("u1"), vec![ItemRequest::new("p1", 1)], Deadline::none())
        .await;

    assert!(matches!(result, Err(OrderError::ValidationFailed(_))));
    assert_eq!(h.store.row_counts().unwrap(), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_validation_deadline_persists_nothing() {
    let catalog = MockProductCatalog::new().with_delay(Duration::from_secs(30));
    let h = harness_with(InMemoryOrderStore::new(), catalog, MockUserDirectory::new());

    let result = h
        .service
        .create_order(
            UserId::from("u1"),
            vec![ItemRequest::new("p1", 1)],
            Deadline::after(Duration::from_millis(200)),
        )
        .await;

    assert!(matches!(result, Err(OrderError::ValidationFailed(_))));
    assert_eq!(h.store.row_counts().unwrap(), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_store_deadline_persists_nothing() {
    let store = InMemoryOrderStore::with_latency(Duration::from_secs(30));
    let h = harness_with(store, MockProductCatalog::new(), MockUserDirectory::new());
    h.catalog.expect_validate().return_ok(widget(9.99));

    let result = h
        .service
        .create_order(
            UserId::from("u1"),
            vec![ItemRequest::new("p1", 1)],
            Deadline::after(Duration::from_millis(200)),
        )
        .await;

    assert!(matches!(result, Err(OrderError::Storage(_))), "{result:?}");
    h.catalog.verify();
    assert_eq!(h.store.row_counts().unwrap(), (0, 0));
}

#[tokio::test]
async fn test_malformed_create_never_reaches_authority() {
    let h = harness();

    let cases = [
        (UserId::from(""), vec![ItemRequest::new("p1", 1)]),
        (UserId::from("u1"), vec![]),
        (UserId::from("u1"), vec![ItemRequest::new("", 1)]),
        (UserId::from("u1"), vec![ItemRequest::new("p1", 0)]),
    ];
    for (user_id, items) in cases {
        let result = h.service.create_order(user_id, items, Deadline::none()).await;
        assert!(matches!(result, Err(OrderError::InvalidArgument(_))), "{result:?}");
    }
    assert!(h.catalog.calls().is_empty());
}

#[tokio::test]
async fn test_mid_write_failure_leaves_no_rows() {
    let h = harness();
    h.catalog.expect_validate().return_ok(ValidationResult {
        valid: true,
        products: vec![
            ValidatedProduct {
                product_id: ProductId::from("p1"),
                price: 9.99,
                name: "Widget".to_string(),
            },
            ValidatedProduct {
                product_id: ProductId::from("p2"),
                price: 24.50,
                name: "Gadget".to_string(),
            },
        ],
    });
    // The order row and first item go in, the second item fails.
    h.store.fail_item_insert_after(1).unwrap();

    let result = h
        .service
        .create_order(
            UserId::from("u1"),
            vec![ItemRequest::new("p1", 1), ItemRequest::new("p2", 1)],
            Deadline::none(),
        )
        .await;

    assert!(matches!(result, Err(OrderError::Storage(_))));
    assert_eq!(h.store.row_counts().unwrap(), (0, 0));

    let page = h
        .service
        .list_orders(&UserId::from("u1"), 1, 10, Deadline::none())
        .await
        .unwrap();
    assert!(page.orders.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_list_second_page_newest_first() {
    let h = harness();
    let mut created = Vec::new();
    for _ in 0..25 {
        created.push(place(&h, "u1").await.id);
    }
    place(&h, "u2").await;
    created.reverse();

    let page = h
        .service
        .list_orders(&UserId::from("u1"), 2, 10, Deadline::none())
        .await
        .unwrap();

    assert_eq!(page.total, 25);
    assert_eq!(page.page, 2);
    assert_eq!(page.limit, 10);
    let ids: Vec<_> = page.orders.iter().map(|o| o.id.clone()).collect();
    assert_eq!(ids, created[10..20].to_vec());

    let last = h
        .service
        .list_orders(&UserId::from("u1"), 3, 10, Deadline::none())
        .await
        .unwrap();
    assert_eq!(last.orders.len(), 5);
    assert_eq!(last.total, 25);
}

#[tokio::test]
async fn test_list_rejects_bad_paging() {
    let h = harness();
    for (page, limit) in [(0, 10), (1, 0), (1, 101), (-1, 10)] {
        let result = h
            .service
            .list_orders(&UserId::from("u1"), page, limit, Deadline::none())
            .await;
        assert!(
            matches!(result, Err(OrderError::InvalidArgument(_))),
            "page={page} limit={limit}"
        );
    }
}

#[tokio::test]
async fn test_update_status_advances_timestamp() {
    let h = harness();
    let created = place(&h, "u1").await;

    let confirmed = h
        .service
        .update_order_status(&created.id, "confirmed", Deadline::none())
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.updated_at > created.updated_at);
    assert_eq!(confirmed.created_at, created.created_at);

    let shipped = h
        .service
        .update_order_status(&created.id, "SHIPPED", Deadline::none())
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.updated_at > confirmed.updated_at);
}

#[tokio::test]
async fn test_update_unknown_order_is_not_found() {
    let h = harness();
    let result = h
        .service
        .update_order_status(&OrderId::from("missing"), "confirmed", Deadline::none())
        .await;
    assert!(matches!(result, Err(OrderError::NotFound(_))));
}

#[tokio::test]
async fn test_illegal_transition_leaves_order_unchanged() {
    let h = harness();
    let created = place(&h, "u1").await;
    h.service
        .update_order_status(&created.id, "cancelled", Deadline::none())
        .await
        .unwrap();

    let result = h
        .service
        .update_order_status(&created.id, "shipped", Deadline::none())
        .await;

    match result {
        Err(OrderError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, OrderStatus::Cancelled);
            assert_eq!(to, OrderStatus::Shipped);
        }
        other => panic!("Expected InvalidTransition, got {other:?}"),
    }
    let stored = h.store.get_by_id(&created.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_unknown_status_is_rejected() {
    let h = harness();
    let created = place(&h, "u1").await;

    let result = h
        .service
        .update_order_status(&created.id, "teleported", Deadline::none())
        .await;

    assert!(matches!(result, Err(OrderError::InvalidArgument(_))));
    let stored = h.store.get_by_id(&created.id).await.unwrap();
    assert_eq!(stored, created);
}

#[tokio::test]
async fn test_update_storage_failure_is_reported() {
    let h = harness();
    let created = place(&h, "u1").await;
    h.store.fail_next_update().unwrap();

    let result = h
        .service
        .update_order_status(&created.id, "confirmed", Deadline::none())
        .await;

    assert!(matches!(result, Err(OrderError::Storage(_))));
    let stored = h.store.get_by_id(&created.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_racing_confirm_cannot_reopen_cancelled_order() {
    let store = InMemoryOrderStore::with_latency(Duration::from_millis(20));
    let h = harness_with(store, MockProductCatalog::new(), MockUserDirectory::new());
    let created = place(&h, "u1").await;

    // Both requests read `pending` before either write lands.
    let (cancel, confirm) = tokio::join!(
        h.service
            .update_order_status(&created.id, "cancelled", Deadline::none()),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            h.service
                .update_order_status(&created.id, "confirmed", Deadline::none())
                .await
        }
    );

    assert_eq!(cancel.unwrap().status, OrderStatus::Cancelled);
    assert_eq!(
        confirm,
        Err(OrderError::InvalidTransition {
            id: created.id.clone(),
            from: OrderStatus::Cancelled,
            to: OrderStatus::Confirmed,
        })
    );
    let stored = h.store.get_by_id(&created.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_lost_race_is_rechecked_against_winning_status() {
    let store = InMemoryOrderStore::with_latency(Duration::from_millis(20));
    let h = harness_with(store, MockProductCatalog::new(), MockUserDirectory::new());
    let created = place(&h, "u1").await;

    // The cancel read `pending` but confirmed won; cancelling a confirmed
    // order is still allowed.
    let (confirm, cancel) = tokio::join!(
        h.service
            .update_order_status(&created.id, "confirmed", Deadline::none()),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            h.service
                .update_order_status(&created.id, "cancelled", Deadline::none())
                .await
        }
    );

    let confirmed = confirm.unwrap();
    let cancelled = cancel.unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.updated_at > confirmed.updated_at);

    let stored = h.store.get_by_id(&created.id).await.unwrap();
    assert_eq!(stored, cancelled);
}
