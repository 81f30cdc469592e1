//! Start page, aggregates, receipt PDFs, room layouts and the log feed.

use super::{html, html_page, snapshot_logs, HtmlError, HttpState};
use crate::domain::error::AppError;
use crate::domain::receipt::ReceiptKind;
use crate::domain::room_layout::RoomLayout;
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{get, put, web, HttpResponse};

#[get("/")]
pub async fn index(data: web::Data<HttpState>) -> Result<HttpResponse, HtmlError> {
    let tables = data
        .app
        .table_editor
        .list_tables()
        .await
        .map_err(|e| data.fail("Index", e))?;
    Ok(html_page(html::index_page(
        &tables,
        &data.app.join_views.list_views(),
        &data.app.aggregates.list(),
    )))
}

#[get("/api/aggregate")]
pub async fn list_aggregates(data: web::Data<HttpState>) -> HttpResponse {
    HttpResponse::Ok().json(data.app.aggregates.list())
}

#[get("/aggregate/{name}")]
pub async fn aggregate_page(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, HtmlError> {
    let result = data
        .app
        .aggregates
        .run(&path.into_inner())
        .await
        .map_err(|e| data.fail("Aggregate", e))?;
    Ok(html_page(html::aggregate_page(&result)))
}

#[get("/api/aggregate/{name}")]
pub async fn aggregate_json(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let result = data
        .app
        .aggregates
        .run(&path.into_inner())
        .await
        .map_err(|e| data.fail("Aggregate", e))?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/generate_pdf/{kind}/{id}")]
pub async fn generate_pdf(
    data: web::Data<HttpState>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse, AppError> {
    let (kind, id) = path.into_inner();
    let kind: ReceiptKind = kind.parse().map_err(|e| data.fail("PDF", e))?;
    let document = data
        .app
        .receipts
        .generate_pdf(kind, id)
        .await
        .map_err(|e| data.fail("PDF", e))?;

    data.log(
        "INFO",
        "PDF",
        &format!(
            "Generated {} receipt {} for {}",
            kind.as_str(),
            document.receipt_number,
            id
        ),
    );
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(document.filename)],
        })
        .insert_header(("X-Receipt-Number", document.receipt_number))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(document.bytes))
}

#[get("/api/layout/{room_id}")]
pub async fn get_layout(
    data: web::Data<HttpState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let layout = data
        .app
        .layouts
        .get_layout(path.into_inner())
        .await
        .map_err(|e| data.fail("Layout", e))?;
    Ok(HttpResponse::Ok().json(layout))
}

#[put("/api/layout/{room_id}")]
pub async fn save_layout(
    data: web::Data<HttpState>,
    path: web::Path<i64>,
    body: web::Json<RoomLayout>,
) -> Result<HttpResponse, AppError> {
    let layout = data
        .app
        .layouts
        .save_layout(path.into_inner(), body.into_inner())
        .await
        .map_err(|e| data.fail("Layout", e))?;
    Ok(HttpResponse::Ok().json(layout))
}

#[get("/api/logs")]
pub async fn get_logs(data: web::Data<HttpState>) -> HttpResponse {
    HttpResponse::Ok().json(snapshot_logs(&data.logs))
}
