//! Store-backed scenarios. Each test runs in its own schema of the database
//! named by `$POSTGRES_URL`; run them with `cargo test -- --ignored`.

use std::collections::BTreeSet;

use anyhow::Result;
use maplit::btreeset;
use rand::seq::SliceRandom;

use infra::ids::Id;

use crate::drinks::{
    CreateDrink, Drink, DrinkFilter, DrinkPredicate, FilterFields, GenerateDrinks, ListDrinks,
    MatchMode, NewDrink, NewDrinkIngredient, Page, ShowDrink,
};
use crate::error::Error;
use crate::ingredients::{ImportIngredients, Ingredient, ListIngredients, NewIngredient, ShowIngredient};
use crate::services::{Commandable, Queryable};
use crate::Barback;


fn barback(schema: &str) -> Result<Barback> {
    env_logger::try_init().unwrap_or_default();
    Ok(Barback::from_pool(junk_drawer::pool(schema)?))
}

fn import(bb: &Barback, names: &[&str]) -> Result<Vec<Ingredient>> {
    let mut ingredients = names
        .iter()
        .map(|name| NewIngredient {
            name: name.to_string(),
            display_name: name.to_uppercase(),
        })
        .collect::<Vec<_>>();
    ingredients.shuffle(&mut rand::thread_rng());
    let report = bb
        .ingredients()
        .execute(ImportIngredients { ingredients })?;
    Ok(report.created)
}

fn recipe(lines: &[(&str, &str)]) -> Vec<NewDrinkIngredient> {
    lines
        .iter()
        .map(|(name, measurement)| NewDrinkIngredient {
            name: name.to_string(),
            measurement: measurement.to_string(),
        })
        .collect()
}

fn create(bb: &Barback, name: &str, lines: &[(&str, &str)]) -> Result<Drink> {
    let created = bb.drinks().execute(CreateDrink(NewDrink {
        name: name.to_string(),
        display_name: name.to_uppercase(),
        description: None,
        instructions: "stir".to_string(),
        drink_ingredients: recipe(lines),
    }))?;
    Ok(created.drink)
}

fn id_of(ingredients: &[Ingredient], name: &str) -> Id<Ingredient> {
    ingredients
        .iter()
        .find(|i| i.name == name)
        .map(|i| i.id)
        .expect("seeded ingredient")
}

/// Five drinks needing two distinct ingredients each, from a pool of ten.
fn seed_bar(bb: &Barback) -> Result<(Vec<Drink>, Vec<Ingredient>)> {
    let pool = (1..=10).map(|n| format!("ingredient{:02}", n)).collect::<Vec<_>>();
    let names = pool.iter().map(String::as_str).collect::<Vec<_>>();
    let ingredients = import(bb, &names)?;

    let mut order = (0..5).collect::<Vec<usize>>();
    order.shuffle(&mut rand::thread_rng());
    let mut drinks = Vec::new();
    for n in order {
        let drink = create(
            bb,
            &format!("drink{}", n + 1),
            &[(names[2 * n], "1 oz"), (names[2 * n + 1], "2 oz")],
        )?;
        drinks.push(drink);
    }
    drinks.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((drinks, ingredients))
}

fn names<'a, I: IntoIterator<Item = &'a Drink>>(drinks: I) -> Vec<&'a str> {
    drinks.into_iter().map(|d| d.name.as_str()).collect()
}

#[test]
#[ignore]
fn strict_match_finds_exactly_the_covered_drink() -> Result<()> {
    let bb = barback("strict_match_finds_exactly_the_covered_drink")?;
    let (_, ingredients) = seed_bar(&bb)?;

    let offered = vec![
        id_of(&ingredients, "ingredient01"),
        id_of(&ingredients, "ingredient02"),
        id_of(&ingredients, "ingredient02"),
    ];
    let matched = bb.drinks().query(GenerateDrinks {
        ingredients: offered,
        mode: MatchMode::Strict,
    })?;

    assert_eq!(names(matched.iter().map(|m| &m.drink)), vec!["drink1"]);
    assert_eq!(matched[0].ingredients_present, 2);
    assert_eq!(matched[0].missing_ingredients, 0);
    Ok(())
}

#[test]
#[ignore]
fn partial_match_reports_what_is_missing() -> Result<()> {
    let bb = barback("partial_match_reports_what_is_missing")?;
    let (_, ingredients) = seed_bar(&bb)?;

    let matched = bb.drinks().query(GenerateDrinks {
        ingredients: vec![
            id_of(&ingredients, "ingredient01"),
            id_of(&ingredients, "ingredient03"),
            id_of(&ingredients, "ingredient04"),
        ],
        mode: MatchMode::Partial,
    })?;

    let summary = matched
        .iter()
        .map(|m| (m.drink.name.as_str(), m.missing_ingredients))
        .collect::<Vec<_>>();
    assert_eq!(summary, vec![("drink2", 0), ("drink1", 1)]);
    assert_eq!(matched[1].total_ingredients, 2);
    assert_eq!(matched[1].drink.drink_ingredients.len(), 2);
    Ok(())
}

#[test]
#[ignore]
fn empty_offer_matches_nothing() -> Result<()> {
    let bb = barback("empty_offer_matches_nothing")?;
    seed_bar(&bb)?;

    for mode in &[MatchMode::Strict, MatchMode::Partial] {
        let matched = bb.drinks().query(GenerateDrinks {
            ingredients: vec![],
            mode: *mode,
        })?;
        assert!(matched.is_empty(), "{:?}: {:?}", mode, matched);
    }
    Ok(())
}

#[test]
#[ignore]
fn drink_without_recipe_never_matches() -> Result<()> {
    let bb = barback("drink_without_recipe_never_matches")?;
    let ingredients = import(&bb, &["water"])?;
    create(&bb, "mystery", &[("unobtainium", "1 dash")])?;

    let matched = bb.drinks().query(GenerateDrinks {
        ingredients: ingredients.iter().map(|i| i.id).collect(),
        mode: MatchMode::Partial,
    })?;

    assert!(matched.is_empty(), "{:?}", matched);
    Ok(())
}

#[test]
#[ignore]
fn name_list_filter_returns_named_drinks() -> Result<()> {
    let bb = barback("name_list_filter_returns_named_drinks")?;
    seed_bar(&bb)?;

    let fields = FilterFields {
        id: None,
        name: Some("drink4,drink2".into()),
    };
    let drinks = bb
        .drinks()
        .query(ListDrinks(DrinkFilter::from_fields(&fields, Page::default())))?;
    assert_eq!(names(&drinks), vec!["drink2", "drink4"]);

    let single = bb
        .drinks()
        .query(ListDrinks(DrinkFilter::all().and(DrinkPredicate::from_names("drink3"))))?;
    assert_eq!(names(&single), vec!["drink3"]);
    Ok(())
}

#[test]
#[ignore]
fn id_and_name_filters_are_conjoined() -> Result<()> {
    let bb = barback("id_and_name_filters_are_conjoined")?;
    let (drinks, _) = seed_bar(&bb)?;
    let first = drinks[0].id;

    let matching = FilterFields {
        id: Some(first),
        name: Some("drink1".into()),
    };
    let found = bb
        .drinks()
        .query(ListDrinks(DrinkFilter::from_fields(&matching, Page::default())))?;
    assert_eq!(names(&found), vec!["drink1"]);

    let conflicting = FilterFields {
        id: Some(first),
        name: Some("drink2".into()),
    };
    let none = bb
        .drinks()
        .query(ListDrinks(DrinkFilter::from_fields(&conflicting, Page::default())))?;
    assert!(none.is_empty(), "{:?}", none);
    Ok(())
}

#[test]
#[ignore]
fn pages_apply_offset_then_limit() -> Result<()> {
    let bb = barback("pages_apply_offset_then_limit")?;
    seed_bar(&bb)?;

    let page = bb
        .drinks()
        .query(ListDrinks(DrinkFilter::all().with_page(Page::new(Some(2), Some(1)))))?;
    assert_eq!(names(&page), vec!["drink2", "drink3"]);

    let everything = bb
        .drinks()
        .query(ListDrinks(DrinkFilter::all().with_page(Page::new(Some(0), Some(0)))))?;
    assert_eq!(everything.len(), 5);
    Ok(())
}

#[test]
#[ignore]
fn created_drink_reads_back_with_its_recipe() -> Result<()> {
    let bb = barback("created_drink_reads_back_with_its_recipe")?;
    import(&bb, &["Vodka", "Lime"])?;

    let created = create(&bb, "vodka lime", &[("Vodka", "1.5oz"), ("Lime", "1 slice")])?;
    let loaded = bb.drinks().query(ShowDrink(created.id))?;

    let lines = loaded
        .drink_ingredients
        .iter()
        .map(|l| (l.name.as_str(), l.measurement.as_str()))
        .collect::<BTreeSet<_>>();
    assert_eq!(lines, btreeset! {("Vodka", "1.5oz"), ("Lime", "1 slice")});
    assert_eq!(loaded, created);
    Ok(())
}

#[test]
#[ignore]
fn unresolved_ingredients_are_reported() -> Result<()> {
    let bb = barback("unresolved_ingredients_are_reported")?;
    import(&bb, &["Vodka"])?;

    let created = bb.drinks().execute(CreateDrink(NewDrink {
        name: "typo".into(),
        display_name: "Typo".into(),
        description: Some("one good line".into()),
        instructions: "pour".into(),
        drink_ingredients: recipe(&[("Vodka", "2oz"), ("Vodak", "1oz")]),
    }))?;

    assert_eq!(created.unresolved, vec!["Vodak".to_string()]);
    assert_eq!(created.drink.drink_ingredients.len(), 1);
    assert_eq!(created.drink.description.as_deref(), Some("one good line"));
    Ok(())
}

#[test]
#[ignore]
fn invalid_drink_writes_nothing() -> Result<()> {
    let bb = barback("invalid_drink_writes_nothing")?;
    import(&bb, &["Vodka"])?;

    let res = bb.drinks().execute(CreateDrink(NewDrink {
        name: "no instructions".into(),
        display_name: "No Instructions".into(),
        description: None,
        instructions: String::new(),
        drink_ingredients: recipe(&[("Vodka", "2oz")]),
    }));

    match res {
        Err(Error::ValidationFailed(_)) => {}
        other => panic!("expected validation failure, got {:?}", other),
    }
    let drinks = bb.drinks().query(ListDrinks(DrinkFilter::all()))?;
    assert!(drinks.is_empty(), "{:?}", drinks);
    Ok(())
}

#[test]
#[ignore]
fn duplicate_drink_name_rolls_back() -> Result<()> {
    let bb = barback("duplicate_drink_name_rolls_back")?;
    import(&bb, &["Gin", "Tonic"])?;
    create(&bb, "g&t", &[("Gin", "2oz")])?;

    let res = create(&bb, "g&t", &[("Gin", "1oz"), ("Tonic", "4oz")]);
    assert!(res.is_err(), "{:?}", res);

    let drinks = bb.drinks().query(ListDrinks(DrinkFilter::all()))?;
    assert_eq!(drinks.len(), 1);
    assert_eq!(drinks[0].drink_ingredients.len(), 1);
    Ok(())
}

#[test]
#[ignore]
fn missing_drink_is_not_found() -> Result<()> {
    let bb = barback("missing_drink_is_not_found")?;

    match bb.drinks().query(ShowDrink(Id::from_raw(404))) {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
    Ok(())
}

#[test]
#[ignore]
fn ingredients_list_by_name_and_skip_duplicates() -> Result<()> {
    let bb = barback("ingredients_list_by_name_and_skip_duplicates")?;
    import(&bb, &["lime", "gin", "angostura"])?;

    let report = bb.ingredients().execute(ImportIngredients {
        ingredients: vec![
            NewIngredient {
                name: "gin".into(),
                display_name: "Gin".into(),
            },
            NewIngredient {
                name: "mint".into(),
                display_name: "Mint".into(),
            },
        ],
    })?;
    assert_eq!(report.skipped, vec!["gin".to_string()]);
    assert_eq!(report.created.len(), 1);

    let all = bb.ingredients().query(ListIngredients)?;
    let listed = all.iter().map(|i| i.name.as_str()).collect::<Vec<_>>();
    assert_eq!(listed, vec!["angostura", "gin", "lime", "mint"]);

    let mint = bb.ingredients().query(ShowIngredient(report.created[0].id))?;
    assert_eq!(mint.display_name, "Mint");
    Ok(())
}
