use super::{html, html_page, HtmlError, HttpState};
use crate::domain::error::AppError;
use crate::domain::record::Record;
use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

const SOURCE: &str = "Table";

#[derive(Deserialize)]
#[serde(untagged)]
pub enum UpdateRequest {
    Cell {
        id: Value,
        column: String,
        #[serde(default)]
        value: Value,
    },
    Row {
        id: Value,
        values: Record,
    },
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    pub id: Value,
}

#[derive(Deserialize)]
pub struct AddQuery {
    #[serde(default)]
    pub dedupe: bool,
}

#[derive(Deserialize)]
pub struct NewColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
}

#[get("/table/{table}")]
pub async fn table_page(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, HtmlError> {
    let table = path.into_inner();
    let editor = &data.app.table_editor;

    let schema = editor
        .describe_table(&table)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    let rows = editor.list_rows(&table).await.map_err(|e| data.fail(SOURCE, e))?;
    let options = editor
        .foreign_key_options(&table)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;

    Ok(html_page(html::table_page(
        &schema,
        &rows,
        &options,
        &data.app.labels,
    )))
}

#[get("/api/table/{table}")]
pub async fn list_rows(
    data: web::Data<HttpState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let table = path.into_inner();
    let rows = data
        .app
        .table_editor
        .list_rows(&table)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(HttpResponse::Ok().json(json!({ "table": table, "rows": rows })))
}

#[get("/api/schema")]
pub async fn list_schemas(data: web::Data<HttpState>) -> Result<HttpResponse, AppError> {
    let schemas = data
        .app
        .table_editor
        .list_schemas()
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    Ok(HttpResponse::Ok().json(schemas))
}

#[post("/add/{table}")]
pub async fn add_row(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<AddQuery>,
    body: web::Json<Record>,
) -> Result<HttpResponse, AppError> {
    let table = path.into_inner();
    let result = data
        .app
        .table_editor
        .add_row(&table, &body, query.dedupe)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;

    if !result.existing {
        data.log("INFO", SOURCE, &format!("Added row {} to {}", result.id, table));
    }
    Ok(HttpResponse::Ok().json(result))
}

#[post("/update/{table}")]
pub async fn update_row(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<UpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let table = path.into_inner();
    let editor = &data.app.table_editor;
    let outcome = match body.into_inner() {
        UpdateRequest::Cell { id, column, value } => {
            editor.update_cell(&table, &id, &column, &value).await
        }
        UpdateRequest::Row { id, values } => editor.update_row(&table, &id, &values).await,
    };
    outcome.map_err(|e| data.fail(SOURCE, e))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

async fn remove_row(
    data: &HttpState,
    table: &str,
    request: DeleteRequest,
) -> Result<HttpResponse, AppError> {
    data.app
        .table_editor
        .delete_row(table, &request.id)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log("INFO", SOURCE, &format!("Deleted row {} from {}", request.id, table));
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[delete("/delete/{table}")]
pub async fn delete_row(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<DeleteRequest>,
) -> Result<HttpResponse, AppError> {
    remove_row(&data, &path.into_inner(), body.into_inner()).await
}

#[post("/delete/{table}")]
pub async fn delete_row_via_post(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<DeleteRequest>,
) -> Result<HttpResponse, AppError> {
    remove_row(&data, &path.into_inner(), body.into_inner()).await
}

#[post("/api/table/{table}/columns")]
pub async fn add_column(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<NewColumn>,
) -> Result<HttpResponse, AppError> {
    let table = path.into_inner();
    let schema = data
        .app
        .table_editor
        .add_column(&table, &body.name, &body.sql_type)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log(
        "INFO",
        SOURCE,
        &format!("Added column {} ({}) to {}", body.name, body.sql_type, table),
    );
    Ok(HttpResponse::Ok().json(schema))
}

#[delete("/api/table/{table}/columns/{column}")]
pub async fn drop_column(
    data: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (table, column) = path.into_inner();
    let schema = data
        .app
        .table_editor
        .drop_column(&table, &column)
        .await
        .map_err(|e| data.fail(SOURCE, e))?;
    data.log("INFO", SOURCE, &format!("Dropped column {} from {}", column, table));
    Ok(HttpResponse::Ok().json(schema))
}
