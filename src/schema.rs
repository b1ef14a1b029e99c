// Handwritten to match migrations/; the `wellness` staging table is not
// declared here because its columns depend on the decoded records.

diesel::table! {
    missing (date) {
        date -> Text,
    }
}

diesel::table! {
    heart_rate (unix_timestamp, bpm) {
        unix_timestamp -> BigInt,
        #[sql_name = "heart_rate"]
        bpm -> BigInt,
    }
}

diesel::table! {
    stress_level (unix_timestamp, level) {
        unix_timestamp -> BigInt,
        #[sql_name = "stress_level"]
        level -> BigInt,
    }
}

diesel::table! {
    activity (unix_timestamp, activity_type) {
        unix_timestamp -> BigInt,
        steps -> Nullable<BigInt>,
        distance -> Nullable<Double>,
        activity_type -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(missing, heart_rate, stress_level, activity,);
