mod common;

use common::{seeded, university};
use study_planner_core::domain::{Category, DegreeType, Level};
use study_planner_core::recommend::{discover_universities, recommend_universities, ResultLimit};

#[tokio::test]
async fn safe_schools_come_first_then_target_then_dream() {
    let mut reach = university("University of Toronto", Some(21), Level::High);
    reach.avg_gpa_required = Some(3.9);
    let mut stretch = university("McGill University", Some(30), Level::Medium);
    stretch.avg_gpa_required = Some(3.9);
    stretch.min_ielts_required = Some(7.5);
    let comfortable = university("Dalhousie University", Some(298), Level::Low);
    let unranked = university("Acadia University", None, Level::Medium);

    let (db, _, profile) = seeded(vec![reach, stretch, comfortable, unranked]);

    let ranked = recommend_universities(&db, &profile, ResultLimit::default())
        .await
        .expect("recommendations");
    let order: Vec<(&str, Category)> = ranked
        .iter()
        .map(|rec| (rec.university.name.as_str(), rec.category))
        .collect();

    assert_eq!(
        order,
        vec![
            ("Dalhousie University", Category::Safe),
            ("Acadia University", Category::Safe),
            ("McGill University", Category::Target),
            ("University of Toronto", Category::Dream),
        ]
    );
}

#[tokio::test]
async fn limit_applies_before_ranking() {
    let reach = university("University of Toronto", Some(21), Level::High);
    let safe = university("Dalhousie University", Some(298), Level::Low);
    let (db, _, profile) = seeded(vec![reach, safe]);

    let ranked = recommend_universities(&db, &profile, ResultLimit::new(1).expect("limit"))
        .await
        .expect("recommendations");

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].university.name, "University of Toronto");
    assert_eq!(ranked[0].category, Category::Dream);
}

#[tokio::test]
async fn candidates_are_filtered_by_degree_country_and_field() {
    let mut elsewhere = university("TU Munich", Some(37), Level::Medium);
    elsewhere.country = "Germany".to_string();
    let mut undergrad = university("Carleton University", Some(500), Level::Low);
    undergrad.degree_type = DegreeType::Bachelors;
    let mut other_field = university("Queen's University", Some(209), Level::Medium);
    other_field.field_of_study = Some("Business".to_string());
    let matching = university("University of Waterloo", Some(112), Level::Medium);

    let (db, _, profile) = seeded(vec![elsewhere, undergrad, other_field, matching]);

    let ranked = recommend_universities(&db, &profile, ResultLimit::default())
        .await
        .expect("recommendations");
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].university.name, "University of Waterloo");
}

#[tokio::test]
async fn discovery_ignores_field_and_honours_country() {
    let mut business = university("Queen's University", Some(209), Level::Medium);
    business.field_of_study = Some("Business".to_string());
    let mut abroad = university("TU Munich", Some(37), Level::Medium);
    abroad.country = "Germany".to_string();
    let (db, _, profile) = seeded(vec![business, abroad]);

    let all = discover_universities(&db, &profile, None, ResultLimit::default())
        .await
        .expect("discover");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "TU Munich");

    let german = discover_universities(&db, &profile, Some("Germany"), ResultLimit::default())
        .await
        .expect("discover");
    assert_eq!(german.len(), 1);
}

#[test]
fn limits_outside_range_are_rejected() {
    assert!(ResultLimit::new(0).is_err());
    assert!(ResultLimit::new(51).is_err());
    assert_eq!(ResultLimit::from_param(None).expect("default").get(), 20);
    assert_eq!(ResultLimit::new(50).expect("max").get(), 50);
}
