diesel::table! {
    records (record_type, id) {
        seq -> Int8,
        record_type -> Text,
        id -> Uuid,
        company_id -> Nullable<Uuid>,
        data -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
