mod common;

use pretty_assertions::assert_eq;

use common::*;
use nutrition_engine::{
    Config, Error, ErrorKind, IngredientInput, IngredientSource, NutrientSource, RecipeInput,
    RecipePolicy, Settings, Tracker, ValidationError,
};

fn recipe_input(name: &str) -> RecipeInput {
    RecipeInput {
        name: name.to_string(),
        description: String::new(),
    }
}

#[test]
fn test_catalog_food_kcal_is_derived() {
    let t = tracker();
    let created = chicken(&t);
    assert_eq!(created.kcal, 125.0);

    let updated = t
        .update_catalog_food(created.id, food("Chicken", 33.333, 33.333, 33.333))
        .unwrap();
    assert_eq!(updated.proteins, 33.3);
    assert_eq!(updated.kcal, 566.1);
}

#[test]
fn test_food_validation() {
    let t = tracker();
    let err = t
        .create_catalog_food(food("Impossible", 60.0, 30.0, 20.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MacroSumExceeded);
    assert!(err.is_recoverable());

    let err = t
        .create_catalog_food(food("Negative", -1.0, 0.0, 0.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MacroOutOfRange);

    let err = t.create_catalog_food(food("   ", 1.0, 1.0, 1.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidName);

    let err = t
        .create_catalog_food(food(&"x".repeat(256), 1.0, 1.0, 1.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidName);

    assert!(t.list_catalog_foods().unwrap().is_empty());
}

#[test]
fn test_duplicate_names_are_integrity_errors() {
    let t = tracker();
    chicken(&t);
    let err = t
        .create_catalog_food(food("Chicken", 1.0, 1.0, 1.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);

    custom(&t, OWNER, "Stew");
    assert_eq!(
        t.create_custom_food(OWNER, food("Stew", 1.0, 1.0, 1.0))
            .unwrap_err()
            .kind(),
        ErrorKind::Integrity
    );
    // names are unique per owner only
    custom(&t, OTHER_OWNER, "Stew");
}

#[test]
fn test_custom_foods_are_private() {
    let t = tracker();
    let stew = custom(&t, OWNER, "Stew");

    assert!(matches!(
        t.get_custom_food(OTHER_OWNER, stew.id),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        t.update_custom_food(OTHER_OWNER, stew.id, food("Mine", 1.0, 1.0, 1.0)),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        t.delete_custom_food(OTHER_OWNER, stew.id),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        t.record_consumption(
            OTHER_OWNER,
            eaten(hours_ago(1), 100, NutrientSource::Custom(stew.id))
        ),
        Err(Error::NotFound(_))
    ));
    assert_eq!(t.list_custom_foods(OWNER).unwrap(), vec![stew]);
    assert!(t.list_custom_foods(OTHER_OWNER).unwrap().is_empty());
}

#[test]
fn test_ingredient_owner_must_match_recipe() {
    let t = tracker();
    let (recipe, oats) = porridge(&t);
    let err = t
        .add_ingredient(
            OTHER_OWNER,
            recipe.id,
            IngredientInput {
                mass_grams: 10,
                source: IngredientSource::Catalog(oats.id),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::OwnerMismatch { recipe_id }) if recipe_id == recipe.id
    ));
    assert_eq!(err.kind().as_str(), "OWNER_MISMATCH");

    assert_eq!(t.get_recipe(OWNER, recipe.id).unwrap().name, "Porridge");
    assert!(matches!(
        t.get_recipe(OTHER_OWNER, recipe.id),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_ingredient_mass_bounds() {
    let t = tracker();
    let (recipe, oats) = porridge(&t);
    for mass_grams in [0, 10_001] {
        let err = t
            .add_ingredient(
                OWNER,
                recipe.id,
                IngredientInput {
                    mass_grams,
                    source: IngredientSource::Catalog(oats.id),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMass);
    }
}

#[test]
fn test_ingredient_referencing_missing_food() {
    let t = tracker();
    let (recipe, _) = porridge(&t);
    assert!(matches!(
        t.add_ingredient(
            OWNER,
            recipe.id,
            IngredientInput {
                mass_grams: 10,
                source: IngredientSource::Catalog(9_999),
            },
        ),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_update_ingredient_switches_source() {
    let t = tracker();
    let (recipe, _) = porridge(&t);
    let details = t.recipe_ingredients(OWNER, recipe.id).unwrap();
    let oats_row = details.ingredients[0].id;

    let updated = t
        .update_ingredient(
            OWNER,
            oats_row,
            IngredientInput {
                mass_grams: 40,
                source: IngredientSource::Manual(manual("Rolled oats", 13.0, 7.0, 58.0)),
            },
        )
        .unwrap();
    assert_eq!(updated.catalog_food_id, None);
    assert_eq!(updated.name.as_deref(), Some("Rolled oats"));
    assert_eq!(updated.mass_grams, 40);
    assert_eq!(updated.kcal, Some(347.0));
}

#[test]
fn test_empty_recipes_allowed_by_default() {
    let t = tracker();
    let recipe = t
        .create_recipe(OWNER, recipe_input("Nothing yet"), vec![])
        .unwrap();
    let profile = t.recipe_profile(OWNER, recipe.id).unwrap();
    assert_eq!(profile.total_mass, 0);
    assert_eq!(profile.per_100g, nutrition_engine::Nutrition::zero());

    // but nobody can eat it
    let err = t
        .record_consumption(
            OWNER,
            eaten(hours_ago(1), 100, NutrientSource::Recipe(recipe.id)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRecipe);
}

#[test]
fn test_require_ingredients_policy() {
    let t = tracker_with(Settings {
        recipe_policy: RecipePolicy::RequireIngredients,
        ..Settings::default()
    });
    let err = t
        .create_recipe(OWNER, recipe_input("Nothing yet"), vec![])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRecipe);
    assert!(t.list_recipes(OWNER).unwrap().is_empty());

    let oats = oats(&t);
    let recipe = t
        .create_recipe(
            OWNER,
            recipe_input("Just oats"),
            vec![IngredientInput {
                mass_grams: 80,
                source: IngredientSource::Catalog(oats.id),
            }],
        )
        .unwrap();
    let only = t.recipe_ingredients(OWNER, recipe.id).unwrap().ingredients[0].id;
    let err = t.remove_ingredient(OWNER, only).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRecipe);
    assert_eq!(t.recipe_ingredients(OWNER, recipe.id).unwrap().ingredients.len(), 1);
}

#[test]
fn test_failed_recipe_creation_persists_nothing() {
    let t = tracker();
    let err = t
        .create_recipe(
            OWNER,
            recipe_input("Broken"),
            vec![IngredientInput {
                mass_grams: 100,
                source: IngredientSource::Custom(42),
            }],
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(t.list_recipes(OWNER).unwrap().is_empty());
}

#[test]
fn test_consumption_date_bounds() {
    let t = tracker();
    let food = chicken(&t);

    let err = t
        .record_consumption(
            OWNER,
            eaten(hours_ago(-1), 100, NutrientSource::Catalog(food.id)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDate);

    let err = t
        .record_consumption(
            OWNER,
            eaten(hours_ago(31 * 24), 100, NutrientSource::Catalog(food.id)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDate);

    // both ends of the window are accepted
    t.record_consumption(OWNER, eaten(now(), 100, NutrientSource::Catalog(food.id)))
        .unwrap();
    t.record_consumption(
        OWNER,
        eaten(hours_ago(30 * 24), 100, NutrientSource::Catalog(food.id)),
    )
    .unwrap();
}

#[test]
fn test_consumption_mass_bounds() {
    let t = tracker();
    let chicken = chicken(&t);
    let record = t
        .record_consumption(
            OWNER,
            eaten(hours_ago(1), 100, NutrientSource::Catalog(chicken.id)),
        )
        .unwrap();

    for mass_grams in [0, 10_001] {
        let err = t
            .record_consumption(
                OWNER,
                eaten(hours_ago(1), mass_grams, NutrientSource::Catalog(chicken.id)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMass);

        let err = t
            .update_consumption(
                OWNER,
                record.id,
                eaten(hours_ago(1), mass_grams, NutrientSource::Catalog(chicken.id)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMass);
    }
    assert_eq!(t.get_consumption_record(OWNER, record.id).unwrap().mass_grams, 100);

    for mass_grams in [1, 10_000] {
        t.record_consumption(
            OWNER,
            eaten(hours_ago(1), mass_grams, NutrientSource::Catalog(chicken.id)),
        )
        .unwrap();
    }
    assert_eq!(t.day_report(OWNER, today()).unwrap().items.len(), 3);
}

#[test]
fn test_unbounded_retention_window() {
    // representable as a duration, but reaches past the earliest date
    let t = tracker_with(Settings {
        max_eaten_food_age_days: 100_000_000_000,
        ..Settings::default()
    });
    let chicken = chicken(&t);
    t.record_consumption(
        OWNER,
        eaten(hours_ago(400 * 24), 100, NutrientSource::Catalog(chicken.id)),
    )
    .unwrap();

    let err = t
        .record_consumption(
            OWNER,
            eaten(hours_ago(-1), 100, NutrientSource::Catalog(chicken.id)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDate);
}

#[test]
fn test_consumption_update_and_delete() {
    let t = tracker();
    let food = chicken(&t);
    let record = t
        .record_consumption(
            OWNER,
            eaten(hours_ago(2), 200, NutrientSource::Catalog(food.id)),
        )
        .unwrap();

    let updated = t
        .update_consumption(
            OWNER,
            record.id,
            eaten(
                hours_ago(2),
                100,
                NutrientSource::Manual(manual("Leftovers", 10.0, 10.0, 10.0)),
            ),
        )
        .unwrap();
    assert_eq!(updated.catalog_food_id, None);
    assert_eq!(updated.name.as_deref(), Some("Leftovers"));
    assert_eq!(updated.kcal, Some(170.0));

    assert!(matches!(
        t.delete_consumption(OTHER_OWNER, record.id),
        Err(Error::NotFound(_))
    ));
    t.delete_consumption(OWNER, record.id).unwrap();
    assert!(matches!(
        t.get_consumption_record(OWNER, record.id),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_favorites() {
    let t = tracker();
    let chicken = chicken(&t);
    let oats = oats(&t);

    t.add_favorite(OWNER, oats.id).unwrap();
    t.add_favorite(OWNER, chicken.id).unwrap();
    let err = t.add_favorite(OWNER, chicken.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(matches!(
        t.add_favorite(OWNER, 9_999),
        Err(Error::NotFound(_))
    ));

    let names: Vec<String> = t
        .list_favorites(OWNER)
        .unwrap()
        .into_iter()
        .map(|food| food.name)
        .collect();
    assert_eq!(names, vec!["Chicken", "Oats"]);
    assert!(t.list_favorites(OTHER_OWNER).unwrap().is_empty());

    assert!(t.remove_favorite(OWNER, oats.id).unwrap());
    assert!(!t.remove_favorite(OWNER, oats.id).unwrap());

    t.delete_catalog_food(chicken.id).unwrap();
    assert!(t.list_favorites(OWNER).unwrap().is_empty());
}

#[test]
fn test_tracker_from_config() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.db");
    let database_url = path.to_str().unwrap().to_string();
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "DB_POOL_MAX_SIZE" => Some("2".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.redis_url, None);

    let tracker = Tracker::from_config(&config).unwrap();
    let chicken = tracker
        .create_catalog_food(food("Chicken", 20.0, 5.0, 0.0))
        .unwrap();
    assert_eq!(tracker.list_catalog_foods().unwrap(), vec![chicken]);
    assert_eq!(tracker.settings(), &config.settings);
}
