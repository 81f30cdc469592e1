use super::{html, html_page, HtmlError, HttpState};
use crate::domain::error::AppError;
use crate::domain::record::Record;
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::{json, Value};

const SOURCE: &str = "JoinView";

#[get("/view/{view}")]
pub async fn view_page(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, HtmlError> {
    let name = path.into_inner();
    let views = &data.app.join_views;
    let view = views.fetch_view(&name).await.map_err(|e| data.fail(SOURCE, e))?;
    let options = views
        .fetch_select_options(&name)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(html_page(html::view_page(&view, &options)))
}

#[get("/api/join")]
pub async fn list_views(data: web::Data<HttpState>) -> HttpResponse {
    HttpResponse::Ok().json(data.app.join_views.list_views())
}

#[get("/api/join/{view}/options")]
pub async fn select_options(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let options = data
        .app
        .join_views
        .fetch_select_options(&path.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(HttpResponse::Ok().json(options))
}

#[get("/api/join/{view}")]
pub async fn fetch_view(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let view = data
        .app
        .join_views
        .fetch_view(&path.into_inner())
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(HttpResponse::Ok().json(view))
}

#[put("/api/join/{view}")]
pub async fn update_view_row(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<Record>,
) -> Result<HttpResponse, AppError> {
    let name = path.into_inner();
    let result = data
        .app
        .join_views
        .update_view_row(&name, &body)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;

    if !result.ignored.is_empty() {
        data.log(
            "WARN",
            SOURCE,
            &format!("{}: ignored read-only fields {:?}", name, result.ignored),
        );
    }
    Ok(HttpResponse::Ok().json(result))
}

#[post("/api/join/{view}")]
pub async fn insert_view_row(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<Record>,
) -> Result<HttpResponse, AppError> {
    let name = path.into_inner();
    let id = data
        .app
        .join_views
        .insert_view_row(&name, &body)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log("INFO", SOURCE, &format!("Inserted row {} via view {}", id, name));
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id })))
}

#[delete("/api/join/{view}/{pk}")]
pub async fn delete_view_row(
    data: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (name, pk) = path.into_inner();
    data.app
        .join_views
        .delete_view_row(&name, &Value::String(pk.clone()))
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log("INFO", SOURCE, &format!("Deleted row {} via view {}", pk, name));
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
