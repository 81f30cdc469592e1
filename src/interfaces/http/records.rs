//! Typed person and department endpoints plus the two guided wizards.

use super::{html, html_page, HtmlError, HttpState};
use crate::domain::error::AppError;
use crate::domain::personnel::{
    AbteilungAssignment, AbteilungUpdate, NewAbteilung, NewPerson, PersonUpdate,
};
use crate::domain::schema::SelectOption;
use crate::domain::wizard::{PersonWizardInput, TransponderWizardInput};
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const SOURCE: &str = "Data";

#[derive(Deserialize)]
pub struct IdRequest {
    pub id: i64,
}

fn inserted(id: i64) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "inserted", "id": id }))
}

fn status(status: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": status }))
}

#[post("/api/data/person")]
pub async fn insert_person(
    data: web::Data<HttpState>,
    body: web::Json<NewPerson>,
) -> Result<HttpResponse, AppError> {
    let id = data
        .app
        .personnel
        .insert_person(body.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log("INFO", SOURCE, &format!("Inserted person {}", id));
    Ok(inserted(id))
}

#[put("/api/data/person")]
pub async fn update_person(
    data: web::Data<HttpState>,
    body: web::Json<PersonUpdate>,
) -> Result<HttpResponse, AppError> {
    data.app
        .personnel
        .update_person(body.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(status("updated"))
}

#[delete("/api/data/person")]
pub async fn delete_person(
    data: web::Data<HttpState>,
    body: web::Json<IdRequest>,
) -> Result<HttpResponse, AppError> {
    data.app
        .personnel
        .delete_person(body.id)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log("INFO", SOURCE, &format!("Deleted person {}", body.id));
    Ok(status("deleted"))
}

#[post("/api/data/abteilung")]
pub async fn insert_abteilung(
    data: web::Data<HttpState>,
    body: web::Json<NewAbteilung>,
) -> Result<HttpResponse, AppError> {
    let id = data
        .app
        .personnel
        .insert_abteilung(body.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(inserted(id))
}

#[put("/api/data/abteilung")]
pub async fn update_abteilung(
    data: web::Data<HttpState>,
    body: web::Json<AbteilungUpdate>,
) -> Result<HttpResponse, AppError> {
    data.app
        .personnel
        .update_abteilung(body.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(status("updated"))
}

#[delete("/api/data/abteilung")]
pub async fn delete_abteilung(
    data: web::Data<HttpState>,
    body: web::Json<IdRequest>,
) -> Result<HttpResponse, AppError> {
    data.app
        .personnel
        .delete_abteilung(body.id)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(status("deleted"))
}

#[post("/api/data/person_to_abteilung")]
pub async fn assign_abteilung(
    data: web::Data<HttpState>,
    body: web::Json<AbteilungAssignment>,
) -> Result<HttpResponse, AppError> {
    let id = data
        .app
        .personnel
        .assign_person_to_abteilung(body.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(inserted(id))
}

#[delete("/api/data/person_to_abteilung")]
pub async fn unassign_abteilung(
    data: web::Data<HttpState>,
    body: web::Json<AbteilungAssignment>,
) -> Result<HttpResponse, AppError> {
    data.app
        .personnel
        .remove_person_from_abteilung(body.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(status("deleted"))
}

/// Options of the foreign key `column` of the link table `table`.
async fn link_options(
    data: &HttpState,
    table: &str,
    column: &str,
) -> Result<Vec<SelectOption>, AppError> {
    let mut options: BTreeMap<String, Vec<SelectOption>> = data
        .app
        .table_editor
        .foreign_key_options(table)
        .await
        .map_err(|e| data.fail("Wizard", e))?;
    Ok(options.remove(column).unwrap_or_default())
}

#[get("/wizard/person")]
pub async fn person_wizard_page(data: web::Data<HttpState>) -> Result<HttpResponse, HtmlError> {
    let abteilungen = link_options(&data, "person_to_abteilung", "abteilung_id").await?;
    let rooms = link_options(&data, "person_to_room", "room_id").await?;
    let professorships = link_options(&data, "professorship_to_person", "professorship_id").await?;
    Ok(html_page(html::person_wizard_page(
        &abteilungen,
        &rooms,
        &professorships,
    )))
}

#[post("/wizard/person")]
pub async fn person_wizard(
    data: web::Data<HttpState>,
    body: web::Json<PersonWizardInput>,
) -> Result<HttpResponse, AppError> {
    let outcome = data
        .app
        .wizards
        .create_person(body.into_inner())
        .await
        .map_err(|e| data.fail("Wizard", e))?;
    data.log(
        "INFO",
        "Wizard",
        &format!("Created person {} ({})", outcome.id, outcome.linked.join(", ")),
    );
    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/wizard/transponder")]
pub async fn transponder_wizard_page(
    data: web::Data<HttpState>,
) -> Result<HttpResponse, HtmlError> {
    let persons = link_options(&data, "transponder", "owner_id").await?;
    let rooms = link_options(&data, "transponder_to_room", "room_id").await?;
    Ok(html_page(html::transponder_wizard_page(&persons, &rooms)))
}

#[post("/wizard/transponder")]
pub async fn transponder_wizard(
    data: web::Data<HttpState>,
    body: web::Json<TransponderWizardInput>,
) -> Result<HttpResponse, AppError> {
    let outcome = data
        .app
        .wizards
        .create_transponder(body.into_inner())
        .await
        .map_err(|e| data.fail("Wizard", e))?;
    data.log(
        "INFO",
        "Wizard",
        &format!("Issued transponder {} for {} rooms", outcome.id, outcome.linked.len()),
    );
    Ok(HttpResponse::Ok().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{http_state, test_app};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_person_crud_statuses() {
        let state = http_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/data/person")
            .set_json(json!({ "first_name": "Lea", "last_name": "Wolf" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], json!("inserted"));
        let id = body["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri("/api/data/person")
            .set_json(json!({ "id": id, "comment": "Gast" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], json!("updated"));

        let req = test::TestRequest::delete()
            .uri("/api/data/person")
            .set_json(json!({ "id": id }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], json!("deleted"));

        let req = test::TestRequest::post()
            .uri("/api/data/person")
            .set_json(json!({ "first_name": "", "last_name": "Wolf" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_duplicate_assignment_conflicts() {
        let state = http_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/data/person_to_abteilung")
            .set_json(json!({ "person_id": 1, "abteilung_id": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::delete()
            .uri("/api/data/person_to_abteilung")
            .set_json(json!({ "person_id": 1, "abteilung_id": 1 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], json!("deleted"));
    }

    #[actix_web::test]
    async fn test_abteilung_crud() {
        let state = http_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/data/abteilung")
            .set_json(json!({ "name": "Bibliothek" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri("/api/data/abteilung")
            .set_json(json!({ "id": id, "abteilungsleiter_id": 2 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri("/api/data/abteilung")
            .set_json(json!({ "id": 999 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_wizards() {
        let state = http_state().await;
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/wizard/transponder").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(page.contains("Anna Müller"));
        assert!(page.contains(r#"name="room_ids" multiple"#));

        let req = test::TestRequest::post()
            .uri("/wizard/transponder")
            .set_json(json!({
                "serial_number": "T-500",
                "issuer_id": "2",
                "owner_id": "1",
                "got_date": "2025-02-01",
                "comment": "",
                "room_ids": ["1"]
            }))
            .to_request();
        let outcome: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome["success"], json!(true));

        let req = test::TestRequest::post()
            .uri("/wizard/person")
            .set_json(json!({
                "first_name": "Jonas",
                "last_name": "Weber",
                "room_id": "42"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
    }
}
