use super::*;
use crate::format::PgFormatter;
use serde_json::json;

fn rows(data: &Value) -> DataRows<'_> {
    DataRows::from_value(Some(data)).unwrap()
}

fn single(data: &Value) -> &Map<String, Value> {
    data.as_object().unwrap()
}

#[test]
fn test_parse_descriptors() {
    assert_eq!(Column::parse("name"), Column::new("name"));
    assert_eq!(Column::parse("name?"), Column::optional("name"));
    assert_eq!(Column::parse("meta::jsonb"), Column::new("meta").cast("jsonb"));
    assert_eq!(
        Column::parse("meta::jsonb?"),
        Column::optional("meta").cast("jsonb")
    );
}

#[test]
fn test_insert_single() {
    let data = json!({ "name": "Ann", "age": 30 });
    let set = ColumnSet::new(["name", "age"]);
    let sql = set.insert(&PgFormatter, "users", &rows(&data)).unwrap();
    assert_eq!(sql, r#"INSERT INTO "users" ("name", "age") VALUES ('Ann', 30)"#);
}

#[test]
fn test_optional_column_skipped_when_absent() {
    let data = json!({ "name": "Ann" });
    let set = ColumnSet::new(["name", "nickname?"]);
    let sql = set.insert(&PgFormatter, "users", &rows(&data)).unwrap();
    assert_eq!(sql, r#"INSERT INTO "users" ("name") VALUES ('Ann')"#);
}

#[test]
fn test_optional_column_kept_when_null() {
    let data = json!({ "name": "Ann", "nickname": null });
    let set = ColumnSet::new(["name", "nickname?"]);
    let sql = set.insert(&PgFormatter, "users", &rows(&data)).unwrap();
    assert_eq!(
        sql,
        r#"INSERT INTO "users" ("name", "nickname") VALUES ('Ann', NULL)"#
    );
}

#[test]
fn test_falsy_values_are_present() {
    let data = json!({ "count": 0, "label": "", "flag": false });
    let set = ColumnSet::new(["count?", "label?", "flag?"]);
    let sql = set.update(&PgFormatter, "t", single(&data)).unwrap();
    assert_eq!(sql, r#"UPDATE "t" SET "count" = 0, "label" = '', "flag" = false"#);
}

#[test]
fn test_required_column_missing() {
    let data = json!({ "name": "Ann" });
    let set = ColumnSet::new(["name", "email"]);
    let err = set.insert(&PgFormatter, "users", &rows(&data)).unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::DataPropertyMissing);
    assert!(err.message.contains("'email'"));
}

#[test]
fn test_multi_row_insert_uses_default_for_missing_optional() {
    let data = json!([
        { "name": "Ann", "nickname": "A" },
        { "name": "Bob" }
    ]);
    let set = ColumnSet::new(["name", "nickname?"]);
    let sql = set.insert(&PgFormatter, "users", &rows(&data)).unwrap();
    assert_eq!(
        sql,
        r#"INSERT INTO "users" ("name", "nickname") VALUES ('Ann', 'A'), ('Bob', DEFAULT)"#
    );
}

#[test]
fn test_multi_row_insert_drops_optional_absent_everywhere() {
    let data = json!([{ "name": "Ann" }, { "name": "Bob" }]);
    let set = ColumnSet::new(["name", "nickname?"]);
    let sql = set.insert(&PgFormatter, "users", &rows(&data)).unwrap();
    assert_eq!(sql, r#"INSERT INTO "users" ("name") VALUES ('Ann'), ('Bob')"#);
}

#[test]
fn test_multi_row_required_missing_names_row() {
    let data = json!([{ "name": "Ann" }, { "nick": "B" }]);
    let err = ColumnSet::new(["name"])
        .insert(&PgFormatter, "users", &rows(&data))
        .unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::DataPropertyMissing);
    assert!(err.message.contains("row 1"));
}

#[test]
fn test_prop_cast_and_default() {
    let data = json!({ "fullName": "Ann" });
    let set = ColumnSet::new([
        Column::new("full_name").prop("fullName"),
        Column::new("meta").cast("jsonb").default(json!({})),
    ]);
    let sql = set.insert(&PgFormatter, "public.users", &rows(&data)).unwrap();
    assert_eq!(
        sql,
        r#"INSERT INTO "public"."users" ("full_name", "meta") VALUES ('Ann', '{}'::jsonb)"#
    );
}

#[test]
fn test_update_single() {
    let data = json!({ "name": "Ann", "age": 31 });
    let sql = ColumnSet::from_keys(single(&data))
        .update(&PgFormatter, "users", single(&data))
        .unwrap();
    assert_eq!(sql, r#"UPDATE "users" SET "name" = 'Ann', "age" = 31"#);
}

#[test]
fn test_update_all_columns_skipped() {
    let data = json!({ "other": 1 });
    let err = ColumnSet::new(["name?", "age?"])
        .update(&PgFormatter, "users", single(&data))
        .unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::EmptyData);
}

#[test]
fn test_update_many() {
    let data = json!([
        { "id": 1, "name": "Ann" },
        { "id": 2, "name": "Bob" }
    ]);
    let set = ColumnSet::new(["id", "name"]);
    let sql = set
        .update_many(&PgFormatter, "users", &rows(&data).rows(), "id")
        .unwrap();
    assert_eq!(
        sql,
        r#"UPDATE "users" AS t SET "name" = v."name" FROM (VALUES (1, 'Ann'), (2, 'Bob')) AS v("id", "name") WHERE v."id" = t."id""#
    );
}

#[test]
fn test_update_many_key_not_in_set() {
    let data = json!([{ "code": "a", "qty": 1 }]);
    let sql = ColumnSet::new(["qty::int"])
        .update_many(&PgFormatter, "stock", &rows(&data).rows(), "code")
        .unwrap();
    assert_eq!(
        sql,
        r#"UPDATE "stock" AS t SET "qty" = v."qty" FROM (VALUES ('a', 1::int)) AS v("code", "qty") WHERE v."code" = t."code""#
    );
}

#[test]
fn test_update_many_missing_key() {
    let data = json!([{ "id": 1, "name": "A" }, { "name": "B" }]);
    let err = ColumnSet::new(["name"])
        .update_many(&PgFormatter, "users", &rows(&data).rows(), "id")
        .unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::DataPropertyMissing);
    assert!(err.message.contains("'id'"));
}

#[test]
fn test_update_many_optional_columns() {
    let data = json!([{ "id": 1, "name": "A" }, { "id": 2, "name": "B" }]);
    let sql = ColumnSet::new(["name", "email?"])
        .update_many(&PgFormatter, "users", &rows(&data).rows(), "id")
        .unwrap();
    assert!(sql.contains(r#"SET "name" = v."name" FROM"#));
    assert!(!sql.contains("email"));

    let mixed = json!([{ "id": 1, "name": "A", "email": "a@x" }, { "id": 2, "name": "B" }]);
    let err = ColumnSet::new(["name", "email?"])
        .update_many(&PgFormatter, "users", &rows(&mixed).rows(), "id")
        .unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::DataPropertyMissing);
}

#[test]
fn test_empty_data_shapes() {
    for data in [json!({}), json!([]), json!([{}, {}]), json!("x"), json!(3), json!([1])] {
        let err = DataRows::from_value(Some(&data)).unwrap_err();
        assert_eq!(err.kind, BuildErrorKind::EmptyData, "data: {data}");
    }
    assert_eq!(
        DataRows::from_value(None).unwrap_err().kind,
        BuildErrorKind::EmptyData
    );
}

#[test]
fn test_first_row_skips_empty_objects() {
    let data = json!([{}, { "a": 1 }]);
    let first = rows(&data).first().unwrap();
    assert!(first.contains_key("a"));
}
