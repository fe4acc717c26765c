diesel::table! {
    use diesel::sql_types::*;

    modules (service_id) {
        service_id -> Varchar,
        service_name -> Varchar,
        host -> Varchar,
        port -> Int4,
        version -> Varchar,
        config_schema_id -> Nullable<Varchar>,
        metadata -> Json,
        registered_at -> Timestamptz,
        last_heartbeat -> Timestamptz,
        status -> Varchar,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    config_schemas (schema_id) {
        schema_id -> Varchar,
        service_name -> Varchar,
        schema_version -> Varchar,
        json_schema -> Text,
        created_at -> Timestamptz,
        created_by -> Nullable<Varchar>,
        artifact_id -> Nullable<Varchar>,
        artifact_global_id -> Nullable<Int8>,
        sync_status -> Varchar,
        last_sync_attempt -> Nullable<Timestamptz>,
        sync_error -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(modules, config_schemas);
