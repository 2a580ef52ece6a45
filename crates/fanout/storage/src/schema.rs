//! Diesel schema definitions.

diesel::table! {
    token_subscriptions (partition_key, row_key) {
        partition_key -> Text,
        row_key -> Text,
        user_id -> Text,
        token -> Text,
        platform -> Text,
    }
}

diesel::table! {
    user_subscriptions (partition_key, row_key) {
        partition_key -> Text,
        row_key -> Text,
        user_id -> Text,
        token -> Text,
        platform -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(token_subscriptions, user_subscriptions);
