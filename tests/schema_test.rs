mod common;

use chrono::{Duration, Utc};
use common::{at, TestDb};
use sea_orm::{ActiveModelTrait, ActiveValue::Unchanged, DbErr, EntityTrait, ModelTrait, Set};
use storefront::entities::{order, product, OrderDates};

#[tokio::test]
async fn order_date_defaults_to_insertion_time() {
    let app = TestDb::new().await;
    let alice = app.customer("Alice", "alice@example.com").await;

    let before = Utc::now() - Duration::seconds(1);
    let inserted = order::ActiveModel {
        customer_id: Set(alice.id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .unwrap();

    assert!(inserted.order_date >= before);
    assert!(inserted.order_date <= Utc::now() + Duration::seconds(1));
    assert!(inserted.is_pending());
    assert_eq!(inserted.coupon_code, None);
}

#[tokio::test]
async fn delivered_without_shipment_is_refused() {
    let app = TestDb::new().await;
    let alice = app.customer("Alice", "alice@example.com").await;

    let result = order::ActiveModel {
        order_date: Set(at(2024, 1, 1)),
        delivered_date: Set(Some(at(2024, 1, 4))),
        customer_id: Set(alice.id),
        ..Default::default()
    }
    .insert(&*app.db)
    .await;

    assert!(matches!(result, Err(DbErr::Custom(_))));
    assert!(order::Entity::find().all(&*app.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn updates_cannot_break_date_order() {
    let app = TestDb::new().await;
    let alice = app.customer("Alice", "alice@example.com").await;
    let shipped = app
        .order(
            alice.id,
            OrderDates::new(at(2024, 2, 1), Some(at(2024, 2, 3)), None).unwrap(),
            None,
        )
        .await;

    let mut active: order::ActiveModel = shipped.clone().into();
    active.delivered_date = Set(Some(at(2024, 2, 2)));
    assert!(matches!(active.update(&*app.db).await, Err(DbErr::Custom(_))));

    let mut active: order::ActiveModel = shipped.into();
    active.delivered_date = Set(Some(at(2024, 2, 9)));
    let delivered = active.update(&*app.db).await.unwrap();
    assert_eq!(delivered.delivered_date, Some(at(2024, 2, 9)));
}

#[tokio::test]
async fn partial_updates_are_checked_against_stored_dates() {
    let app = TestDb::new().await;
    let alice = app.customer("Alice", "alice@example.com").await;
    let pending = app
        .order(alice.id, OrderDates::placed(at(2024, 2, 1)), None)
        .await;

    // Delivered without ever shipping, and before it was placed
    let result = order::ActiveModel {
        id: Unchanged(pending.id),
        delivered_date: Set(Some(at(2024, 1, 1))),
        ..Default::default()
    }
    .update(&*app.db)
    .await;
    assert!(matches!(result, Err(DbErr::Custom(_))));

    // Shipping before placement
    let result = order::ActiveModel {
        id: Unchanged(pending.id),
        ship_date: Set(Some(at(2024, 1, 15))),
        ..Default::default()
    }
    .update(&*app.db)
    .await;
    assert!(matches!(result, Err(DbErr::Custom(_))));

    let stored = order::Entity::find_by_id(pending.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, pending);
    assert!(stored.dates().is_ok());

    // A consistent partial update still goes through
    let shipped = order::ActiveModel {
        id: Unchanged(pending.id),
        ship_date: Set(Some(at(2024, 2, 3))),
        ..Default::default()
    }
    .update(&*app.db)
    .await
    .unwrap();
    assert_eq!(shipped.ship_date, Some(at(2024, 2, 3)));
    assert_eq!(shipped.order_date, at(2024, 2, 1));
}

#[tokio::test]
async fn customer_email_is_unique() {
    let app = TestDb::new().await;
    app.customer("Alice", "shared@example.com").await;

    let duplicate = storefront::entities::customer::ActiveModel {
        first_name: Set("Bob".into()),
        last_name: Set("Tester".into()),
        address: Set("2 Main Street".into()),
        city: Set("Springfield".into()),
        postcode: Set("12345".into()),
        email: Set("shared@example.com".into()),
        ..Default::default()
    }
    .insert(&*app.db)
    .await;

    let err = duplicate.unwrap_err();
    assert!(storefront::ServiceError::DatabaseError(err).is_constraint_violation());
}

#[tokio::test]
async fn product_name_is_unique() {
    let app = TestDb::new().await;
    app.product("Teal", 10).await;

    let duplicate = product::ActiveModel {
        name: Set("Teal".into()),
        price: Set(99),
        ..Default::default()
    }
    .insert(&*app.db)
    .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn order_requires_existing_customer() {
    let app = TestDb::new().await;
    let result = OrderDates::placed(at(2024, 1, 1))
        .into_active_model(9999, None)
        .insert(&*app.db)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn orders_reach_products_through_association() {
    let app = TestDb::new().await;
    let alice = app.customer("Alice", "alice@example.com").await;
    let teal = app.product("Teal", 20).await;
    let plum = app.product("Plum", 30).await;
    let order = app
        .order(alice.id, OrderDates::placed(at(2024, 1, 1)), None)
        .await;
    app.link(order.id, teal.id).await;
    app.link(order.id, plum.id).await;

    let mut names: Vec<String> = order
        .find_related(product::Entity)
        .all(&*app.db)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Plum", "Teal"]);

    let orders = teal.find_related(order::Entity).all(&*app.db).await.unwrap();
    assert_eq!(orders, vec![order]);
}
