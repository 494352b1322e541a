table! {
    catalog_foods (id) {
        id -> BigInt,
        name -> Text,
        proteins -> Double,
        fats -> Double,
        carbohydrates -> Double,
        kcal -> Double,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    custom_foods (id) {
        id -> BigInt,
        owner_id -> BigInt,
        name -> Text,
        proteins -> Double,
        fats -> Double,
        carbohydrates -> Double,
        kcal -> Double,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    recipes (id) {
        id -> BigInt,
        owner_id -> BigInt,
        name -> Text,
        description -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    recipe_ingredients (id) {
        id -> BigInt,
        owner_id -> BigInt,
        recipe_id -> BigInt,
        mass_grams -> Integer,
        catalog_food_id -> Nullable<BigInt>,
        custom_food_id -> Nullable<BigInt>,
        name -> Nullable<Text>,
        proteins -> Nullable<Double>,
        fats -> Nullable<Double>,
        carbohydrates -> Nullable<Double>,
        kcal -> Nullable<Double>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    consumption_records (id) {
        id -> BigInt,
        owner_id -> BigInt,
        eaten_at -> Timestamp,
        mass_grams -> Integer,
        catalog_food_id -> Nullable<BigInt>,
        custom_food_id -> Nullable<BigInt>,
        recipe_id -> Nullable<BigInt>,
        name -> Nullable<Text>,
        proteins -> Nullable<Double>,
        fats -> Nullable<Double>,
        carbohydrates -> Nullable<Double>,
        kcal -> Nullable<Double>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    favorites (id) {
        id -> BigInt,
        owner_id -> BigInt,
        catalog_food_id -> BigInt,
        created_at -> Timestamp,
    }
}

table! {
    cache_generations (key) {
        key -> Text,
        generation -> BigInt,
    }
}

joinable!(recipe_ingredients -> recipes (recipe_id));
joinable!(recipe_ingredients -> catalog_foods (catalog_food_id));
joinable!(recipe_ingredients -> custom_foods (custom_food_id));
joinable!(consumption_records -> catalog_foods (catalog_food_id));
joinable!(consumption_records -> custom_foods (custom_food_id));
joinable!(consumption_records -> recipes (recipe_id));
joinable!(favorites -> catalog_foods (catalog_food_id));

allow_tables_to_appear_in_same_query!(
    catalog_foods,
    custom_foods,
    recipes,
    recipe_ingredients,
    consumption_records,
    favorites,
    cache_generations,
);
