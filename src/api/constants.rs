//! API constants and URL builders for Forms v1, Drive v3 and Sheets v4

/// Default host for the Forms API
pub const FORMS_BASE_URL: &str = "https://forms.googleapis.com";

/// Default host for the Drive API
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com";

/// Default host for the Sheets API
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

/// OAuth token endpoint for service-account and refresh-token grants
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// GCE metadata server token endpoint
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Scopes requested for every credential type
pub mod scopes {
    pub const FORMS_BODY: &str = "https://www.googleapis.com/auth/forms.body";
    pub const DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";
    pub const SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";

    pub const ALL: [&str; 3] = [FORMS_BODY, DRIVE_FILE, SPREADSHEETS];
}

/// Field masks used by Forms batch requests
pub mod masks {
    pub const FORM_INFO: &str = "title,description";
    pub const QUIZ: &str = "quizSettings.isQuiz";
    pub const EMAIL_COLLECTION: &str = "emailCollectionType";
    pub const ALL: &str = "*";
    pub const PUBLISH_STATE: &str = "publishState";
}

/// Standard headers
pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const X_CORRELATION_ID: &str = "X-Correlation-ID";
    pub const METADATA_FLAVOR: &str = "Metadata-Flavor";
}

/// Drive MIME type for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Build the editor URL for a form
pub fn edit_uri(form_id: &str) -> String {
    format!("https://docs.google.com/forms/d/{}/edit", form_id)
}

pub fn forms_collection(base_url: &str) -> String {
    format!("{}/v1/forms", base_url)
}

pub fn form_endpoint(base_url: &str, form_id: &str) -> String {
    format!("{}/v1/forms/{}", base_url, form_id)
}

pub fn form_batch_update_endpoint(base_url: &str, form_id: &str) -> String {
    format!("{}/v1/forms/{}:batchUpdate", base_url, form_id)
}

pub fn form_publish_settings_endpoint(base_url: &str, form_id: &str) -> String {
    format!("{}/v1/forms/{}:setPublishSettings", base_url, form_id)
}

pub fn drive_files(base_url: &str) -> String {
    format!("{}/drive/v3/files", base_url)
}

pub fn drive_file(base_url: &str, file_id: &str) -> String {
    format!("{}/drive/v3/files/{}", base_url, file_id)
}

pub fn drive_permissions(base_url: &str, file_id: &str) -> String {
    format!("{}/drive/v3/files/{}/permissions", base_url, file_id)
}

pub fn drive_permission(base_url: &str, file_id: &str, permission_id: &str) -> String {
    format!("{}/drive/v3/files/{}/permissions/{}", base_url, file_id, permission_id)
}

pub fn spreadsheets(base_url: &str) -> String {
    format!("{}/v4/spreadsheets", base_url)
}

pub fn spreadsheet(base_url: &str, spreadsheet_id: &str) -> String {
    format!("{}/v4/spreadsheets/{}", base_url, spreadsheet_id)
}

pub fn spreadsheet_batch_update(base_url: &str, spreadsheet_id: &str) -> String {
    format!("{}/v4/spreadsheets/{}:batchUpdate", base_url, spreadsheet_id)
}

/// Values endpoint; the A1 range is percent-encoded
pub fn spreadsheet_values(base_url: &str, spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}/v4/spreadsheets/{}/values/{}",
        base_url,
        spreadsheet_id,
        urlencoding::encode(range)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_uri() {
        assert_eq!(edit_uri("abc123"), "https://docs.google.com/forms/d/abc123/edit");
    }

    #[test]
    fn test_form_endpoints() {
        assert_eq!(
            form_batch_update_endpoint(FORMS_BASE_URL, "f1"),
            "https://forms.googleapis.com/v1/forms/f1:batchUpdate"
        );
        assert_eq!(
            form_publish_settings_endpoint("http://localhost:1", "f1"),
            "http://localhost:1/v1/forms/f1:setPublishSettings"
        );
    }

    #[test]
    fn test_values_range_is_encoded() {
        assert_eq!(
            spreadsheet_values(SHEETS_BASE_URL, "s1", "Sheet 1!A1:B2"),
            "https://sheets.googleapis.com/v4/spreadsheets/s1/values/Sheet%201%21A1%3AB2"
        );
    }
}
