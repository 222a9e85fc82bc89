// tests/recipes_tests.rs

mod common;

use common::{PIXEL_PNG, TestApp, TestUser, spawn_app, unique};
use foodgram::{import, models::ingredient::NewIngredient};
use serde_json::{Value, json};

struct Fixture {
    app: TestApp,
    author: TestUser,
    tag_id: i64,
    tag_slug: String,
    flour: i64,
    eggs: i64,
}

async fn fixture() -> Fixture {
    let app = spawn_app().await;
    let author = app.register_and_login().await;
    let (tag_id, tag_slug) = app.create_tag("#008000").await;
    let flour = app.create_ingredient(&unique("flour"), "г").await;
    let eggs = app.create_ingredient(&unique("eggs"), "шт.").await;
    Fixture {
        app,
        author,
        tag_id,
        tag_slug,
        flour,
        eggs,
    }
}

fn recipe_body(fx: &Fixture, name: &str) -> Value {
    json!({
        "name": name,
        "text": "<p>Смешать</p><script>alert(1)</script>",
        "cooking_time": 20,
        "image": PIXEL_PNG,
        "tags": [fx.tag_id],
        "ingredients": [
            { "id": fx.flour, "amount": 200 },
            { "id": fx.eggs, "amount": 2 },
        ],
    })
}

async fn create(fx: &Fixture, name: &str) -> Value {
    let response = fx.app.create_recipe(&fx.author, &recipe_body(fx, name)).await;
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn create_and_read_recipe() {
    let fx = fixture().await;
    let name = unique("Блины");
    let recipe = create(&fx, &name).await;

    assert_eq!(recipe["name"], name.as_str());
    assert_eq!(recipe["author"]["id"], fx.author.id);
    assert_eq!(recipe["tags"][0]["color"], "green (#008000)");
    assert_eq!(recipe["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(recipe["is_favorited"], false);
    assert!(recipe["image"].as_str().unwrap().starts_with("/media/recipes/images/"));
    assert!(!recipe["text"].as_str().unwrap().contains("<script>"));

    let response = fx
        .app
        .client
        .get(fx.app.url(&format!("/api/recipes/{}/", recipe["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Same name again is a field error
    let response = fx.app.create_recipe(&fx.author, &recipe_body(&fx, &name)).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["name"].is_array());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn create_rejects_bad_references_and_missing_image() {
    let fx = fixture().await;

    let mut body = recipe_body(&fx, &unique("Суп"));
    body["tags"] = json!([999_999_999]);
    let response = fx.app.create_recipe(&fx.author, &body).await;
    assert_eq!(response.status().as_u16(), 400);
    let errors: Value = response.json().await.unwrap();
    assert!(errors["tags"].is_array());

    let mut body = recipe_body(&fx, &unique("Суп"));
    body["ingredients"] = json!([{ "id": 999_999_999, "amount": 1 }]);
    let response = fx.app.create_recipe(&fx.author, &body).await;
    assert_eq!(response.status().as_u16(), 400);

    let mut body = recipe_body(&fx, &unique("Суп"));
    body.as_object_mut().unwrap().remove("image");
    let response = fx.app.create_recipe(&fx.author, &body).await;
    assert_eq!(response.status().as_u16(), 400);
    let errors: Value = response.json().await.unwrap();
    assert!(errors["image"].is_array());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn name_and_text_must_survive_cleaning() {
    let fx = fixture().await;

    let mut body = recipe_body(&fx, "   ");
    let response = fx.app.create_recipe(&fx.author, &body).await;
    assert_eq!(response.status().as_u16(), 400);
    let errors: Value = response.json().await.unwrap();
    assert!(errors["name"].is_array());

    body["name"] = json!(unique("Кисель"));
    body["text"] = json!("<script>alert(1)</script>");
    let response = fx.app.create_recipe(&fx.author, &body).await;
    assert_eq!(response.status().as_u16(), 400);
    let errors: Value = response.json().await.unwrap();
    assert!(errors["text"].is_array());

    // Surrounding spaces are dropped from the stored name
    let name = unique("Кисель");
    body["name"] = json!(format!("  {}  ", name));
    body["text"] = json!("<p>Варить</p>");
    let response = fx.app.create_recipe(&fx.author, &body).await;
    assert_eq!(response.status().as_u16(), 201);
    let recipe: Value = response.json().await.unwrap();
    assert_eq!(recipe["name"], name.as_str());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn only_author_may_update_or_delete() {
    let fx = fixture().await;
    let recipe = create(&fx, &unique("Омлет")).await;
    let url = fx.app.url(&format!("/api/recipes/{}/", recipe["id"]));
    let stranger = fx.app.register_and_login().await;

    let mut update = recipe_body(&fx, &unique("Омлет"));
    update.as_object_mut().unwrap().remove("image");
    update["ingredients"] = json!([{ "id": fx.eggs, "amount": 3 }]);

    let response = fx
        .app
        .client
        .patch(&url)
        .header("Authorization", stranger.auth())
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = fx
        .app
        .client
        .patch(&url)
        .header("Authorization", fx.author.auth())
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ingredients"].as_array().unwrap().len(), 1);
    assert_eq!(body["ingredients"][0]["amount"], 3);
    assert_eq!(body["image"], recipe["image"]);

    let response = fx
        .app
        .client
        .delete(&url)
        .header("Authorization", stranger.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = fx
        .app
        .client
        .delete(&url)
        .header("Authorization", fx.author.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = fx.app.client.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn favourites_cart_and_filters() {
    let fx = fixture().await;
    let recipe = create(&fx, &unique("Сырники")).await;
    let id = recipe["id"].as_i64().unwrap();
    let other = create(&fx, &unique("Оладьи")).await;
    let reader = fx.app.register_and_login().await;

    let favorite = fx.app.url(&format!("/api/recipes/{}/favorite/", id));
    let response = fx
        .app
        .client
        .post(&favorite)
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], id);
    assert!(body.get("ingredients").is_none());

    let response = fx
        .app
        .client
        .post(&favorite)
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = fx
        .app
        .client
        .get(fx.app.url(&format!(
            "/api/recipes/?author={}&is_favorited=1",
            fx.author.id
        )))
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], id);
    assert_eq!(body["results"][0]["is_favorited"], true);

    let response = fx
        .app
        .client
        .get(fx.app.url(&format!(
            "/api/recipes/?author={}&is_favorited=0&tags={}",
            fx.author.id, fx.tag_slug
        )))
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], other["id"]);

    // Anonymous viewers ignore flag filters
    let response = fx
        .app
        .client
        .get(fx.app.url(&format!(
            "/api/recipes/?author={}&is_favorited=1",
            fx.author.id
        )))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let response = fx
        .app
        .client
        .delete(&favorite)
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = fx
        .app
        .client
        .delete(&favorite)
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = fx
        .app
        .client
        .post(fx.app.url("/api/recipes/999999999/favorite/"))
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = fx
        .app
        .client
        .delete(fx.app.url("/api/recipes/999999999/favorite/"))
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn shopping_list_sums_amounts() {
    let fx = fixture().await;
    let first = create(&fx, &unique("Пирог")).await;
    let second = create(&fx, &unique("Торт")).await;

    for recipe in [&first, &second] {
        let response = fx
            .app
            .client
            .post(fx.app.url(&format!("/api/recipes/{}/shopping_cart/", recipe["id"])))
            .header("Authorization", fx.author.auth())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let response = fx
        .app
        .client
        .get(fx.app.url("/api/recipes/download_shopping_cart/?format=csv"))
        .header("Authorization", fx.author.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(
        response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("shopping_list.csv")
    );
    let text = response.text().await.unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Product,Unit,Amount");
    assert_eq!(lines.len(), 3);
    assert!(text.contains(",г,400"));
    assert!(text.contains(",шт.,4"));

    let response = fx
        .app
        .client
        .get(fx.app.url("/api/recipes/download_shopping_cart/?format=txt"))
        .header("Authorization", fx.author.auth())
        .send()
        .await
        .unwrap();
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert!(response.text().await.unwrap().starts_with("Shopping list"));

    // PDF is the default
    let response = fx
        .app
        .client
        .get(fx.app.url("/api/recipes/download_shopping_cart/"))
        .header("Authorization", fx.author.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert!(
        response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("shopping_list.pdf")
    );
    assert!(response.bytes().await.unwrap().starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn subscriptions_respect_recipes_limit() {
    let fx = fixture().await;
    create(&fx, &unique("Каша")).await;
    create(&fx, &unique("Щи")).await;
    let reader = fx.app.register_and_login().await;

    let response = fx
        .app
        .client
        .post(fx.app.url(&format!(
            "/api/users/{}/subscribe/?recipes_limit=1",
            fx.author.id
        )))
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["recipes_count"], 2);
    assert_eq!(body["recipes"].as_array().unwrap().len(), 1);

    let response = fx
        .app
        .client
        .get(fx.app.url("/api/users/subscriptions/"))
        .header("Authorization", reader.auth())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"][0]["recipes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn catalogue_endpoints() {
    let fx = fixture().await;

    let response = fx
        .app
        .client
        .get(fx.app.url(&format!("/api/tags/{}/", fx.tag_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let tag: Value = response.json().await.unwrap();
    assert_eq!(tag["slug"], fx.tag_slug.as_str());

    let response = fx
        .app
        .client
        .get(fx.app.url("/api/ingredients/?name=FLOUR"))
        .send()
        .await
        .unwrap();
    let found: Value = response.json().await.unwrap();
    assert!(
        found
            .as_array()
            .unwrap()
            .iter()
            .any(|i| i["id"] == fx.flour)
    );
    assert!(
        found
            .as_array()
            .unwrap()
            .iter()
            .all(|i| i["name"].as_str().unwrap().starts_with("flour"))
    );

    // Admin routes are closed to regular users
    let response = fx
        .app
        .client
        .post(fx.app.url("/api/admin/tags/"))
        .header("Authorization", fx.author.auth())
        .json(&json!({ "name": "x", "slug": unique("x"), "color": "red" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn import_skips_ingredients_already_present() {
    let app = spawn_app().await;
    let batch = vec![
        NewIngredient {
            name: unique("rice"),
            measurement_unit: "g".to_string(),
        },
        NewIngredient {
            name: unique("milk"),
            measurement_unit: "ml".to_string(),
        },
    ];

    assert_eq!(import::load(&app.pool, &batch).await.unwrap(), 2);
    assert_eq!(import::load(&app.pool, &batch).await.unwrap(), 0);

    let mut mixed = batch.clone();
    mixed.push(NewIngredient {
        name: unique("sugar"),
        measurement_unit: "g".to_string(),
    });
    assert_eq!(import::load(&app.pool, &mixed).await.unwrap(), 1);

    let names: Vec<String> = mixed.iter().map(|i| i.name.clone()).collect();
    let stored = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM ingredients WHERE name = ANY($1)",
    )
    .bind(&names)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(stored, 3);
}
