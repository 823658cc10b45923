use super::*;
use crate::clause::Join;

#[test]
fn test_select_order_limit_without_filter() {
    let stmt = select("orders")
        .order(OrderSpec::new().desc("created_at"))
        .limit(10)
        .build()
        .unwrap();

    assert_eq!(stmt.kind(), StatementKind::Select);
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT 10;"
    );
    assert!(stmt.sql().ends_with("ORDER BY created_at DESC LIMIT 10;"));
    assert!(!stmt.sql().contains("WHERE"));
    assert!(stmt.params().is_empty());
}

#[test]
fn test_select_full() {
    let stmt = select("users")
        .columns(["users.id", "users.email", "roles.name"])
        .join(JoinSpec::new().join("roles", Join::left("role_id", "id")))
        .filter(
            FilterSpec::new()
                .eq("users", "active", true)
                .in_list("roles", "name", ["admin", "editor"]),
        )
        .order(OrderSpec::new().by("users.email"))
        .limit(50)
        .offset(100)
        .build()
        .unwrap();

    assert_eq!(
        stmt.sql(),
        "SELECT users.id, users.email, roles.name FROM users \
         LEFT JOIN roles ON users.role_id = roles.id \
         WHERE users.active = :where_users_active \
         AND roles.name IN (:where_roles_name_0, :where_roles_name_1) \
         ORDER BY users.email ASC LIMIT 50 OFFSET 100;"
    );
    assert_eq!(stmt.params().len(), 3);
}

#[test]
fn test_select_rejects_expression_columns() {
    let err = select("users")
        .columns(["id", "password) FROM secrets --"])
        .build()
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_select_to_positional() {
    let stmt = select("users")
        .filter(FilterSpec::new().eq("users", "id", 5_i64).is_null("users", "deleted_at"))
        .build()
        .unwrap();
    let positional = stmt.to_positional().unwrap();
    assert_eq!(
        positional.sql,
        "SELECT * FROM users WHERE users.id = $1 AND users.deleted_at IS NULL;"
    );
    assert_eq!(positional.params_ref().len(), 1);
}

#[test]
fn test_select_dollar_in_column_name() {
    let stmt = select("t")
        .filter(FilterSpec::new().eq("t", "a$b$c", 1_i64))
        .build()
        .unwrap();
    assert_eq!(stmt.sql(), "SELECT * FROM t WHERE t.a$b$c = :where_t_a_b_c;");

    let positional = stmt.to_positional().unwrap();
    assert_eq!(positional.sql, "SELECT * FROM t WHERE t.a$b$c = $1;");
    assert_eq!(positional.params.len(), 1);
}

#[test]
fn test_insert() {
    let values = Values::new().set("email", "a@example.com").set("age", 30_i32);
    let stmt = insert_statement("users", &values).unwrap();

    assert_eq!(stmt.kind(), StatementKind::Insert);
    assert_eq!(
        stmt.sql(),
        "INSERT INTO users (email, age) VALUES (:email, :age);"
    );
    let names: Vec<_> = stmt.params().names().collect();
    assert_eq!(names, vec!["email", "age"]);
}

#[test]
fn test_insert_requires_values() {
    assert!(insert_statement("users", &Values::new()).is_err());
}

#[test]
fn test_update() {
    let values = Values::new().set("email", "b@example.com");
    let filter = FilterSpec::new().eq("users", "id", 7_i64);
    let stmt = update_statement("users", &values, &filter).unwrap();

    assert_eq!(
        stmt.sql(),
        "UPDATE users SET email = :email WHERE users.id = :where_users_id;"
    );
    let positional = stmt.to_positional().unwrap();
    assert_eq!(
        positional.sql,
        "UPDATE users SET email = $1 WHERE users.id = $2;"
    );
    let values: Vec<_> = positional.params.iter().map(|p| format!("{p:?}")).collect();
    assert_eq!(values, vec!["\"b@example.com\"", "7"]);
}

#[test]
fn test_update_requires_values_and_filter() {
    let filter = FilterSpec::new().eq("users", "id", 7_i64);
    assert!(update_statement("users", &Values::new(), &filter).is_err());

    let values = Values::new().set("email", "b@example.com");
    let err = update_statement("users", &values, &FilterSpec::new()).unwrap_err();
    assert!(err.to_string().contains("requires a filter"));
}

#[test]
fn test_update_placeholder_collision() {
    let values = Values::new().set("where_users_id", 1_i64);
    let filter = FilterSpec::new().eq("users", "id", 7_i64);
    assert!(update_statement("users", &values, &filter).is_err());
}

#[test]
fn test_delete() {
    let filter = FilterSpec::new()
        .eq("sessions", "user_id", 3_i64)
        .is_true("sessions", "expired");
    let stmt = delete_statement("sessions", &filter).unwrap();
    assert_eq!(
        stmt.sql(),
        "DELETE FROM sessions WHERE sessions.user_id = :where_sessions_user_id \
         AND sessions.expired IS TRUE;"
    );
}

#[test]
fn test_delete_requires_filter() {
    let err = delete_statement("sessions", &FilterSpec::new()).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_count_with_join_and_filter() {
    let join = JoinSpec::new().join("users", Join::inner("user_id", "id"));
    let filter = FilterSpec::new().eq("users", "country", "FR");
    let stmt = count_statement("orders", "*", &filter, &join).unwrap();

    assert_eq!(stmt.kind(), StatementKind::Count);
    assert_eq!(
        stmt.sql(),
        "SELECT COUNT(*) FROM orders INNER JOIN users ON orders.user_id = users.id \
         WHERE users.country = :where_users_country;"
    );
}

#[test]
fn test_count_without_filter() {
    let stmt = count_statement("orders", "id", &FilterSpec::new(), &JoinSpec::new()).unwrap();
    assert_eq!(stmt.sql(), "SELECT COUNT(id) FROM orders;");
}

#[test]
fn test_sum() {
    let filter = FilterSpec::new().eq("orders", "status", "paid");
    let stmt = sum_statement("orders", "total", &filter, &JoinSpec::new()).unwrap();
    assert_eq!(stmt.kind(), StatementKind::Sum);
    assert_eq!(
        stmt.sql(),
        "SELECT SUM(total) FROM orders WHERE orders.status = :where_orders_status;"
    );
    assert!(sum_statement("orders", "*", &filter, &JoinSpec::new()).is_err());
}

#[test]
fn test_custom_statement() {
    let stmt = Statement::custom(
        "SELECT * FROM users WHERE email = :email",
        NamedParams::new().bind("email", "a@example.com"),
    );
    assert_eq!(stmt.kind(), StatementKind::Custom);
    assert_eq!(
        stmt.to_positional().unwrap().sql,
        "SELECT * FROM users WHERE email = $1"
    );
}

#[test]
fn test_chrono_and_uuid_values_bind() {
    let since = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let owner = uuid::Uuid::nil();

    let stmt = update_statement(
        "orders",
        &Values::new().set("shipped_on", since),
        &FilterSpec::new()
            .eq("orders", "owner_id", owner)
            .in_list("orders", "created_on", [since]),
    )
    .unwrap();
    let positional = stmt.to_positional().unwrap();

    assert_eq!(
        positional.sql,
        "UPDATE orders SET shipped_on = $1 WHERE orders.owner_id = $2 AND orders.created_on IN ($3);"
    );
    let bound: Vec<String> = positional.params.iter().map(|v| format!("{v:?}")).collect();
    assert_eq!(
        bound,
        vec![
            "2024-01-31".to_string(),
            "00000000-0000-0000-0000-000000000000".to_string(),
            "2024-01-31".to_string(),
        ]
    );
}
