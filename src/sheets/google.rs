use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, ClientId, ClientSecret,
    RefreshToken, TokenResponse, TokenUrl,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;

use super::{
    parse_modified_time, Cell, CellField, CellWrite, DocumentSource, SheetGrid, SheetsError,
};

const DRIVE_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct GoogleSheets {
    oauth: BasicClient,
    refresh_token: RefreshToken,
    http: reqwest::Client,
    access_token: Mutex<Option<(String, Instant)>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    modified_time: String,
}

#[derive(Debug, Default, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetResource {
    #[serde(default)]
    properties: SheetProperties,
    #[serde(default)]
    conditional_formats: Vec<ConditionalFormat>,
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionalFormat {
    boolean_rule: Option<BooleanRule>,
}

#[derive(Debug, Deserialize)]
struct BooleanRule {
    condition: Option<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(default)]
    values: Vec<ConditionValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionValue {
    user_entered_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    start_row: usize,
    #[serde(default)]
    start_column: usize,
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    formatted_value: Option<String>,
    note: Option<String>,
}

fn activities_from(spreadsheet: Spreadsheet, sheet_title: &str) -> Vec<String> {
    let mut activities: Vec<String> = Vec::new();

    for sheet in spreadsheet.sheets {
        if sheet.properties.title != sheet_title {
            continue;
        }
        for rule in sheet.conditional_formats {
            let values = rule
                .boolean_rule
                .and_then(|rule| rule.condition)
                .map(|condition| condition.values)
                .unwrap_or_default();
            for value in values {
                if let Some(value) = value.user_entered_value {
                    if !activities.contains(&value) {
                        activities.push(value);
                    }
                }
            }
        }
    }

    activities
}

fn grid_from(sheet: SheetResource) -> SheetGrid {
    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for data in sheet.data {
        for (row_offset, row) in data.row_data.into_iter().enumerate() {
            let row_index = data.start_row + row_offset;
            if rows.len() <= row_index {
                rows.resize_with(row_index + 1, Vec::new);
            }

            let cells = &mut rows[row_index];
            for (column_offset, cell) in row.values.into_iter().enumerate() {
                let column_index = data.start_column + column_offset;
                if cells.len() <= column_index {
                    cells.resize_with(column_index + 1, Cell::default);
                }
                cells[column_index] = Cell {
                    value: cell.formatted_value.unwrap_or_default(),
                    note: cell.note.unwrap_or_default(),
                };
            }
        }
    }

    SheetGrid::new(sheet.properties.sheet_id, &sheet.properties.title, rows)
}

fn update_request(sheet_id: i64, write: &CellWrite) -> serde_json::Value {
    let (value, fields) = match write.field {
        CellField::Value => (
            json!({ "userEnteredValue": { "stringValue": write.text } }),
            "userEnteredValue",
        ),
        CellField::Note => (json!({ "note": write.text }), "note"),
    };

    json!({
        "updateCells": {
            "start": {
                "sheetId": sheet_id,
                "rowIndex": write.row,
                "columnIndex": write.column,
            },
            "rows": [{ "values": [value] }],
            "fields": fields,
        }
    })
}

impl GoogleSheets {
    pub fn new(config: &Config) -> Self {
        let oauth = BasicClient::new(
            ClientId::new(config.google_client_id.clone()),
            Some(ClientSecret::new(config.google_client_secret.clone())),
            AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())
                .expect("Invalid authorization URL"),
            Some(
                TokenUrl::new("https://oauth2.googleapis.com/token".to_string())
                    .expect("Invalid token URL"),
            ),
        );

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("Failed to build HTTP client");

        GoogleSheets {
            oauth,
            refresh_token: RefreshToken::new(config.google_refresh_token.clone()),
            http,
            access_token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut access_token = self.access_token.lock().await;

        if let Some((token, expires)) = access_token.as_ref() {
            if Instant::now() < *expires {
                return Ok(token.clone());
            }
        }

        let token = self
            .oauth
            .exchange_refresh_token(&self.refresh_token)
            .request_async(async_http_client)
            .await
            .map_err(|e| SheetsError::Auth(e.to_string()))?;

        /* Renew a minute early so a token never expires mid-request. */
        let lifetime = token
            .expires_in()
            .unwrap_or(Duration::from_secs(3600))
            .saturating_sub(Duration::from_secs(60));
        let secret = token.access_token().secret().to_string();
        *access_token = Some((secret.clone(), Instant::now() + lifetime));
        debug!("Refreshed Google access token");

        Ok(secret)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SheetsError> {
        let access_token = self.access_token().await?;
        let response = request.bearer_auth(access_token).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        match status {
            200 => Ok(serde_json::from_str(&body)?),
            status => Err(SheetsError::Status { status, body }),
        }
    }
}

#[async_trait]
impl DocumentSource for GoogleSheets {
    async fn last_modified(&self, document_id: &str) -> Result<DateTime<Utc>, SheetsError> {
        let request = self
            .http
            .get(format!("{}/{}", DRIVE_URL, document_id))
            .query(&[("fields", "modifiedTime")]);

        let file: DriveFile = self.fetch(request).await?;
        parse_modified_time(&file.modified_time)
    }

    async fn valid_activities(
        &self,
        document_id: &str,
        sheet_title: &str,
    ) -> Result<Vec<String>, SheetsError> {
        let request = self
            .http
            .get(format!("{}/{}", SHEETS_URL, document_id))
            .query(&[(
                "fields",
                "sheets(properties(sheetId,title),conditionalFormats(booleanRule(condition(values(userEnteredValue)))))",
            )]);

        let spreadsheet: Spreadsheet = self.fetch(request).await?;
        Ok(activities_from(spreadsheet, sheet_title))
    }

    async fn sheet(&self, document_id: &str, title: &str) -> Result<SheetGrid, SheetsError> {
        /* A1 notation quotes sheet titles; embedded quotes are doubled. */
        let range = format!("'{}'", title.replace('\'', "''"));
        let request = self
            .http
            .get(format!("{}/{}", SHEETS_URL, document_id))
            .query(&[
                ("ranges", range.as_str()),
                ("includeGridData", "true"),
                (
                    "fields",
                    "sheets(properties(sheetId,title),data(startRow,startColumn,rowData(values(formattedValue,note))))",
                ),
            ]);

        let spreadsheet: Spreadsheet = match self.fetch(request).await {
            Ok(spreadsheet) => spreadsheet,
            /* The API answers an unknown range with a bad request. */
            Err(SheetsError::Status { status: 400, .. }) => {
                return Err(SheetsError::MissingSheet(title.to_string()))
            }
            Err(e) => return Err(e),
        };

        spreadsheet
            .sheets
            .into_iter()
            .next()
            .map(grid_from)
            .ok_or_else(|| SheetsError::MissingSheet(title.to_string()))
    }

    async fn write_cells(
        &self,
        document_id: &str,
        sheet_id: i64,
        writes: &[CellWrite],
    ) -> Result<(), SheetsError> {
        if writes.is_empty() {
            return Ok(());
        }

        let requests: Vec<serde_json::Value> = writes
            .iter()
            .map(|write| update_request(sheet_id, write))
            .collect();
        let request = self
            .http
            .post(format!("{}/{}:batchUpdate", SHEETS_URL, document_id))
            .json(&json!({ "requests": requests }));

        let _: serde_json::Value = self.fetch(request).await?;
        Ok(())
    }
}
