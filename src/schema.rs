diesel2::table! {
    websub_subscriptions (id) {
        id -> Text,
        topic_url -> Text,
        hub_url -> Text,
        hub_protocol -> Text,
        created_time -> BigInt,
        lease_seconds -> Nullable<BigInt>,
        verify_token -> Text,
        secret -> Nullable<Text>,
        expiration_time -> Nullable<BigInt>,
        subscription_state -> Text,
    }
}
