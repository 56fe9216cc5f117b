// Diesel schema for the latest local store version.

diesel::table! {
    customers (id) {
        id -> BigInt,
        tenant_id -> Nullable<Text>,
        first_name -> Text,
        last_name -> Text,
        id_number -> Nullable<Text>,
        phone -> Nullable<Text>,
        email -> Nullable<Text>,
        address -> Nullable<Text>,
        notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    suppliers (id) {
        id -> BigInt,
        tenant_id -> Nullable<Text>,
        name -> Text,
        phone -> Nullable<Text>,
        email -> Nullable<Text>,
        address -> Nullable<Text>,
        commission_rate -> Nullable<Double>,
        notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    reservations (id) {
        id -> BigInt,
        tenant_id -> Nullable<Text>,
        customer_id -> BigInt,
        supplier_id -> Nullable<BigInt>,
        contract_number -> Nullable<Text>,
        car_description -> Text,
        pickup_date -> Text,
        return_date -> Text,
        total_price -> Double,
        commission_amount -> Nullable<Double>,
        status -> Text,
        notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    payments (id) {
        id -> BigInt,
        tenant_id -> Nullable<Text>,
        reservation_id -> BigInt,
        amount -> Double,
        method -> Text,
        paid_at -> Text,
        receipt_number -> Nullable<Text>,
        notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    sync_outbox (entity_type, entity_id) {
        entity_type -> Text,
        entity_id -> BigInt,
        is_dirty -> Bool,
        last_dirty_at -> BigInt,
        last_sync_status -> Text,
        last_sync_error -> Nullable<Text>,
    }
}

diesel::table! {
    migration_log (id) {
        id -> Integer,
        run_id -> Text,
        from_version -> Integer,
        to_version -> Integer,
        step_name -> Text,
        outcome -> Text,
        message -> Nullable<Text>,
        started_at -> Text,
        finished_at -> Text,
    }
}

diesel::joinable!(reservations -> customers (customer_id));
diesel::joinable!(reservations -> suppliers (supplier_id));
diesel::joinable!(payments -> reservations (reservation_id));

diesel::allow_tables_to_appear_in_same_query!(
    customers,
    suppliers,
    reservations,
    payments,
    sync_outbox,
    migration_log,
);
