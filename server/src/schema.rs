// Mirrors the externally managed database schema.

diesel::table! {
    ingredients (name) {
        name -> Text,
        vegan_status -> Varchar,
        function_logic -> Nullable<Text>,
        nourishment_fact -> Nullable<Text>,
        swap_static -> Nullable<Text>,
        swap_functional -> Nullable<Text>,
        is_composite -> Bool,
        components -> Array<Nullable<Text>>,
        difficulty_weight -> Nullable<Int4>,
    }
}

diesel::table! {
    products (ingredient_text) {
        ingredient_text -> Text,
        status -> Varchar,
        flagged -> Jsonb,
        explanation -> Text,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(ingredients, products);
