//! Server-rendered pages. Everything interpolated into markup goes through
//! [`escape`]; data handed to inline scripts goes through [`script_json`].

use crate::application::use_cases::aggregate::{AggregateResult, AggregateSummary};
use crate::application::use_cases::join_view::JoinViewData;
use crate::domain::join_view::JoinViewSummary;
use crate::domain::record::{display_value, Record};
use crate::domain::schema::{column_label, ColumnInfo, ColumnKind, SelectOption, TableSchema};
use actix_web::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 1.5rem; color: #222; }
nav a { margin-right: 1rem; }
table { border-collapse: collapse; margin-top: 1rem; }
th, td { border: 1px solid #ccc; padding: 0.25rem 0.5rem; vertical-align: top; }
th { background: #f0f0f0; text-align: left; }
tr.new-row { background: #f8fff0; }
input, select { font: inherit; min-width: 6rem; }
.error { color: #a00; }
form.wizard label { display: block; margin-top: 0.5rem; }
"#;

const COMMON_JS: &str = r#"
async function send(url, method, body) {
  const options = { method, headers: { 'Content-Type': 'application/json' } };
  if (body !== undefined) options.body = JSON.stringify(body);
  const response = await fetch(url, options);
  const data = await response.json().catch(() => ({}));
  if (!response.ok || data.success === false) {
    alert(data.error || response.statusText);
    return null;
  }
  return data;
}
function collect(selector) {
  const data = {};
  document.querySelectorAll(selector + ' [data-column]').forEach(el => {
    if (el.value !== '') data[el.dataset.column] = el.value;
  });
  return data;
}
"#;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// JSON literal safe to place inside a `<script>` element.
pub fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

fn layout(title: &str, body: &str, script: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="de">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<nav><a href="/">Übersicht</a><a href="/wizard/person">Person anlegen</a><a href="/wizard/transponder">Transponder ausgeben</a></nav>
<h1>{title}</h1>
{body}
<script>{COMMON_JS}{script}</script>
</body>
</html>"#,
        title = escape(title),
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        r#"<p class="error">{}</p><p><a href="/">Zurück zur Übersicht</a></p>"#,
        escape(message)
    );
    layout(&format!("Fehler {}", status.as_u16()), &body, "")
}

pub fn index_page(
    tables: &[String],
    views: &[JoinViewSummary],
    aggregates: &[AggregateSummary],
) -> String {
    let mut body = String::from("<h2>Tabellen</h2><ul>");
    for table in tables {
        let _ = write!(
            body,
            r#"<li><a href="/table/{0}">{0}</a></li>"#,
            escape(table)
        );
    }
    body.push_str("</ul><h2>Ansichten</h2><ul>");
    for view in views {
        let _ = write!(
            body,
            r#"<li><a href="/view/{0}">{0}</a> <small>({1})</small></li>"#,
            escape(&view.name),
            escape(&view.base_table)
        );
    }
    body.push_str("</ul><h2>Auswertungen</h2><ul>");
    for aggregate in aggregates {
        let _ = write!(
            body,
            r#"<li><a href="/aggregate/{}">{}</a></li>"#,
            escape(aggregate.name),
            escape(aggregate.title)
        );
    }
    body.push_str(
        r#"</ul><h2>Assistenten</h2><ul>
<li><a href="/wizard/person">Person anlegen</a></li>
<li><a href="/wizard/transponder">Transponder ausgeben</a></li>
</ul>"#,
    );
    layout("Verwaltung", &body, "")
}

fn input_attrs(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => r#"type="number" step="1""#,
        ColumnKind::Real => r#"type="number" step="any""#,
        ColumnKind::Date => r#"type="date""#,
        ColumnKind::Timestamp => r#"type="datetime-local" step="1""#,
        ColumnKind::Text => r#"type="text""#,
    }
}

/// Stored timestamps use a space separator; `datetime-local` wants a `T`.
fn input_value(kind: ColumnKind, value: Option<&Value>) -> String {
    let text = display_value(value);
    match kind {
        ColumnKind::Timestamp => text.replacen(' ', "T", 1),
        _ => text,
    }
}

fn render_select(column: &str, value: Option<&Value>, options: &[SelectOption], extra: &str) -> String {
    let current = display_value(value);
    let mut html = format!(
        r#"<select data-column="{}" {extra}><option value=""></option>"#,
        escape(column)
    );
    for option in options {
        let id = display_value(Some(&option.id));
        let selected = if id == current { " selected" } else { "" };
        let _ = write!(
            html,
            r#"<option value="{}"{selected}>{}</option>"#,
            escape(&id),
            escape(&option.label)
        );
    }
    html.push_str("</select>");
    html
}

fn render_input(
    column: &ColumnInfo,
    value: Option<&Value>,
    options: Option<&Vec<SelectOption>>,
    extra: &str,
) -> String {
    match options {
        Some(options) => render_select(&column.name, value, options, extra),
        None => format!(
            r#"<input {} data-column="{}" value="{}" {extra}>"#,
            input_attrs(column.kind),
            escape(&column.name),
            escape(&input_value(column.kind, value))
        ),
    }
}

pub fn table_page(
    schema: &TableSchema,
    rows: &[Record],
    options: &BTreeMap<String, Vec<SelectOption>>,
    labels: &HashMap<String, String>,
) -> String {
    let pk = schema.primary_key();
    let mut body = String::from("<table><thead><tr>");
    for column in &schema.columns {
        let _ = write!(
            body,
            r#"<th title="{}">{}</th>"#,
            escape(&column.declared_type),
            escape(&column_label(labels, &schema.name, &column.name))
        );
    }
    body.push_str("<th></th></tr></thead><tbody>");

    for row in rows {
        let id = display_value(row.get(pk));
        let _ = write!(body, r#"<tr data-id="{}">"#, escape(&id));
        for column in &schema.columns {
            body.push_str("<td>");
            if column.name == pk {
                body.push_str(&escape(&id));
            } else {
                body.push_str(&render_input(
                    column,
                    row.get(&column.name),
                    options.get(&column.name),
                    r#"onchange="updateCell(this)""#,
                ));
            }
            body.push_str("</td>");
        }
        body.push_str(r#"<td><button onclick="deleteRow(this)">Löschen</button></td></tr>"#);
    }

    body.push_str(r#"<tr id="new-row" class="new-row">"#);
    for column in &schema.columns {
        body.push_str("<td>");
        if column.name != pk {
            body.push_str(&render_input(column, None, options.get(&column.name), ""));
        }
        body.push_str("</td>");
    }
    body.push_str(r#"<td><button onclick="addRow()">Hinzufügen</button></td></tr></tbody></table>"#);

    body.push_str(
        r#"<h2>Spalte hinzufügen</h2>
<input id="new-column-name" placeholder="name">
<select id="new-column-type">
<option>TEXT</option><option>INTEGER</option><option>REAL</option><option>DATE</option><option>TIMESTAMP</option>
</select>
<button onclick="addColumn()">Anlegen</button>"#,
    );

    let script = format!(
        r#"
const TABLE = {table};
async function updateCell(el) {{
  const tr = el.closest('tr');
  await send('/update/' + TABLE, 'POST', {{ id: tr.dataset.id, column: el.dataset.column, value: el.value }});
}}
async function deleteRow(btn) {{
  if (!confirm('Zeile löschen?')) return;
  const tr = btn.closest('tr');
  if (await send('/delete/' + TABLE, 'POST', {{ id: tr.dataset.id }})) tr.remove();
}}
async function addRow() {{
  if (await send('/add/' + TABLE, 'POST', collect('#new-row'))) location.reload();
}}
async function addColumn() {{
  const name = document.getElementById('new-column-name').value;
  const type = document.getElementById('new-column-type').value;
  if (await send('/api/table/' + TABLE + '/columns', 'POST', {{ name, type }})) location.reload();
}}
"#,
        table = script_json(&schema.name)
    );

    layout(&format!("Tabelle {}", schema.name), &body, &script)
}

fn text_input(column: &str, value: Option<&Value>, extra: &str) -> String {
    format!(
        r#"<input type="text" data-column="{}" value="{}" {extra}>"#,
        escape(column),
        escape(&display_value(value))
    )
}

pub fn view_page(data: &JoinViewData, options: &BTreeMap<String, Vec<SelectOption>>) -> String {
    let pk = &data.primary_key;
    let mut body = String::from("<table><thead><tr>");
    for column in &data.columns {
        let _ = write!(body, "<th>{}</th>", escape(column));
    }
    body.push_str("<th></th></tr></thead><tbody>");

    let field = |column: &str, value: Option<&Value>, extra: &str| match options.get(column) {
        Some(opts) => render_select(column, value, opts, extra),
        None => text_input(column, value, extra),
    };

    for row in &data.rows {
        let id = display_value(row.get(pk));
        let _ = write!(body, r#"<tr data-id="{}">"#, escape(&id));
        for column in &data.columns {
            body.push_str("<td>");
            if column == pk {
                body.push_str(&escape(&id));
            } else {
                body.push_str(&field(column, row.get(column), r#"onchange="updateField(this)""#));
            }
            body.push_str("</td>");
        }
        body.push_str(r#"<td><button onclick="deleteRow(this)">Löschen</button></td></tr>"#);
    }

    body.push_str(r#"<tr id="new-row" class="new-row">"#);
    for column in &data.columns {
        body.push_str("<td>");
        if column != pk {
            body.push_str(&field(column, None, ""));
        }
        body.push_str("</td>");
    }
    body.push_str(r#"<td><button onclick="addRow()">Hinzufügen</button></td></tr></tbody></table>"#);

    let script = format!(
        r#"
const VIEW = {view};
const PK = {pk};
async function updateField(el) {{
  const tr = el.closest('tr');
  const body = {{ [PK]: tr.dataset.id, [el.dataset.column]: el.value }};
  const result = await send('/api/join/' + VIEW, 'PUT', body);
  if (result && result.ignored && result.ignored.length) alert('Nicht gespeichert: ' + result.ignored.join(', '));
}}
async function deleteRow(btn) {{
  if (!confirm('Zeile löschen?')) return;
  const tr = btn.closest('tr');
  if (await send('/api/join/' + VIEW + '/' + encodeURIComponent(tr.dataset.id), 'DELETE')) tr.remove();
}}
async function addRow() {{
  if (await send('/api/join/' + VIEW, 'POST', collect('#new-row'))) location.reload();
}}
"#,
        view = script_json(&data.view),
        pk = script_json(pk)
    );

    layout(&format!("Ansicht {}", data.view), &body, &script)
}

fn labelled(label: &str, control: &str) -> String {
    format!("<label>{}<br>{control}</label>", escape(label))
}

fn form_input(name: &str, kind: &str, required: bool) -> String {
    format!(
        r#"<input type="{kind}" name="{}"{}>"#,
        escape(name),
        if required { " required" } else { "" }
    )
}

fn form_select(name: &str, options: &[SelectOption], multiple: bool) -> String {
    let mut html = if multiple {
        format!(r#"<select name="{}" multiple size="6">"#, escape(name))
    } else {
        format!(r#"<select name="{}"><option value=""></option>"#, escape(name))
    };
    for option in options {
        let _ = write!(
            html,
            r#"<option value="{}">{}</option>"#,
            escape(&display_value(Some(&option.id))),
            escape(&option.label)
        );
    }
    html.push_str("</select>");
    html
}

fn wizard_page(title: &str, action: &str, fields: &[String]) -> String {
    let body = format!(
        r#"<form class="wizard" id="wizard" onsubmit="submitWizard(event)">{}
<p><button type="submit">Speichern</button></p></form><p id="result"></p>"#,
        fields.concat()
    );
    let script = format!(
        r#"
async function submitWizard(event) {{
  event.preventDefault();
  const form = document.getElementById('wizard');
  const data = {{}};
  for (const el of form.elements) {{
    if (!el.name) continue;
    data[el.name] = el.multiple ? Array.from(el.selectedOptions, o => o.value) : el.value;
  }}
  const result = await send({action}, 'POST', data);
  if (result) {{
    document.getElementById('result').textContent = 'Gespeichert (ID ' + result.id + ')';
    form.reset();
  }}
}}
"#,
        action = script_json(&action)
    );
    layout(title, &body, &script)
}

pub fn person_wizard_page(
    abteilungen: &[SelectOption],
    rooms: &[SelectOption],
    professorships: &[SelectOption],
) -> String {
    let fields = vec![
        labelled("Titel", &form_input("title", "text", false)),
        labelled("Vorname", &form_input("first_name", "text", true)),
        labelled("Nachname", &form_input("last_name", "text", true)),
        labelled("Kommentar", &form_input("comment", "text", false)),
        labelled("Telefon", &form_input("phone", "tel", false)),
        labelled("Fax", &form_input("fax", "tel", false)),
        labelled("E-Mail", &form_input("email", "email", false)),
        labelled("Abteilung", &form_select("abteilung_id", abteilungen, false)),
        labelled("Raum", &form_select("room_id", rooms, false)),
        labelled("Professur", &form_select("professorship_id", professorships, false)),
    ];
    wizard_page("Person anlegen", "/wizard/person", &fields)
}

pub fn transponder_wizard_page(persons: &[SelectOption], rooms: &[SelectOption]) -> String {
    let fields = vec![
        labelled("Seriennummer", &form_input("serial_number", "text", true)),
        labelled("Ausgegeben von", &form_select("issuer_id", persons, false)),
        labelled("Besitzer", &form_select("owner_id", persons, false)),
        labelled("Ausgabedatum", &form_input("got_date", "date", false)),
        labelled("Kommentar", &form_input("comment", "text", false)),
        labelled("Räume", &form_select("room_ids", rooms, true)),
    ];
    wizard_page("Transponder ausgeben", "/wizard/transponder", &fields)
}

pub fn aggregate_page(result: &AggregateResult) -> String {
    let mut body = format!(
        r#"<p><a href="/api/aggregate/{}">JSON</a></p><table><thead><tr>"#,
        escape(&result.name)
    );
    for column in &result.columns {
        let _ = write!(body, "<th>{}</th>", escape(column));
    }
    body.push_str("</tr></thead><tbody>");
    for row in &result.rows {
        body.push_str("<tr>");
        for column in &result.columns {
            let _ = write!(body, "<td>{}</td>", escape(&display_value(row.get(column))));
        }
        body.push_str("</tr>");
    }
    body.push_str("</tbody></table>");
    layout(&result.title, &body, "")
}
