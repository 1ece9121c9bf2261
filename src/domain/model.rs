use crate::domain::schema::{ColumnType, StructField, TableRecord};
use serde::{Deserialize, Serialize};

/// Directory API `User` 資源。未定型的屬性保留為 `serde_json::Value`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    // 缺少 id 的記錄仍可解碼，由引擎以 Null 主鍵丟棄
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<UserName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_delegated_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_password_at_next_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreed_to_terms: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_whitelisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mailbox_setup: Option<bool>,
    #[serde(rename = "isEnrolledIn2Sv", skip_serializing_if = "Option::is_none")]
    pub is_enrolled_in_2sv: Option<bool>,
    #[serde(rename = "isEnforcedIn2Sv", skip_serializing_if = "Option::is_none")]
    pub is_enforced_in_2sv: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_in_global_address_list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_photo_etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_guest_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_editable_aliases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relations: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_schemas: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ims: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posix_accounts: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_public_keys: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websites: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl TableRecord for RawUser {
    const FIELDS: &'static [StructField] = &[
        StructField::new("id", ColumnType::String),
        StructField::new("primaryEmail", ColumnType::String),
        StructField::new("name", ColumnType::Json),
        StructField::new("isAdmin", ColumnType::Bool),
        StructField::new("isDelegatedAdmin", ColumnType::Bool),
        StructField::new("suspended", ColumnType::Bool),
        StructField::new("suspensionReason", ColumnType::String),
        StructField::new("archived", ColumnType::Bool),
        StructField::new("changePasswordAtNextLogin", ColumnType::Bool),
        StructField::new("agreedToTerms", ColumnType::Bool),
        StructField::new("ipWhitelisted", ColumnType::Bool),
        StructField::new("isMailboxSetup", ColumnType::Bool),
        StructField::new("isEnrolledIn2Sv", ColumnType::Bool),
        StructField::new("isEnforcedIn2Sv", ColumnType::Bool),
        StructField::new("includeInGlobalAddressList", ColumnType::Bool),
        StructField::new("creationTime", ColumnType::Timestamp),
        StructField::new("lastLoginTime", ColumnType::Timestamp),
        StructField::new("deletionTime", ColumnType::Timestamp),
        StructField::new("customerId", ColumnType::String),
        StructField::new("orgUnitPath", ColumnType::String),
        StructField::new("recoveryEmail", ColumnType::String),
        StructField::new("recoveryPhone", ColumnType::String),
        StructField::new("thumbnailPhotoUrl", ColumnType::String),
        StructField::new("thumbnailPhotoEtag", ColumnType::String),
        StructField::new("isGuestUser", ColumnType::Bool),
        StructField::new("aliases", ColumnType::StringList),
        StructField::new("nonEditableAliases", ColumnType::StringList),
        StructField::new("organizations", ColumnType::Json),
        StructField::new("emails", ColumnType::Json),
        StructField::new("phones", ColumnType::Json),
        StructField::new("addresses", ColumnType::Json),
        StructField::new("externalIds", ColumnType::Json),
        StructField::new("relations", ColumnType::Json),
        StructField::new("languages", ColumnType::Json),
        StructField::new("customSchemas", ColumnType::Json),
        StructField::new("gender", ColumnType::Json),
        StructField::new("ims", ColumnType::Json),
        StructField::new("keywords", ColumnType::Json),
        StructField::new("locations", ColumnType::Json),
        StructField::new("notes", ColumnType::Json),
        StructField::new("posixAccounts", ColumnType::Json),
        StructField::new("sshPublicKeys", ColumnType::Json),
        StructField::new("websites", ColumnType::Json),
        StructField::new("kind", ColumnType::String),
        StructField::new("etag", ColumnType::String),
    ];
}

/// `users/{userKey}/aliases` 回傳的別名
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAlias {
    #[serde(default)]
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl TableRecord for UserAlias {
    const FIELDS: &'static [StructField] = &[
        StructField::new("alias", ColumnType::String),
        StructField::new("primaryEmail", ColumnType::String),
        StructField::new("id", ColumnType::String),
        StructField::new("kind", ColumnType::String),
        StructField::new("etag", ColumnType::String),
    ];
}

/// One page of `users.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<RawUser>,
    pub next_page_token: Option<String>,
}

impl UsersPage {
    /// 空字串也視為最後一頁
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasesPage {
    #[serde(default)]
    pub aliases: Vec<UserAlias>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListUsersRequest {
    pub customer: String,
    pub projection: Projection,
    pub max_results: u32,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Full,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::Full => "full",
        }
    }
}

/// 在 fetch channel 中流動的原始記錄
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    User(RawUser),
    Alias(UserAlias),
}

impl Item {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Item::User(user) => serde_json::to_value(user),
            Item::Alias(alias) => serde_json::to_value(alias),
        }
    }

    pub fn as_user(&self) -> Option<&RawUser> {
        match self {
            Item::User(user) => Some(user),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_page_deserializes_directory_response() {
        let page: UsersPage = serde_json::from_value(serde_json::json!({
            "kind": "admin#directory#users",
            "etag": "\"abc\"",
            "users": [{
                "id": "1001",
                "primaryEmail": "ann@example.com",
                "name": {"givenName": "Ann", "familyName": "Lee", "fullName": "Ann Lee"},
                "isAdmin": true,
                "organizations": [{"title": "Eng", "primary": true}],
                "isEnrolledIn2Sv": false
            }],
            "nextPageToken": "token-2"
        }))
        .unwrap();

        assert_eq!(page.users.len(), 1);
        let user = &page.users[0];
        assert_eq!(user.id, "1001");
        assert_eq!(user.primary_email.as_deref(), Some("ann@example.com"));
        assert_eq!(
            user.name.as_ref().and_then(|n| n.given_name.as_deref()),
            Some("Ann")
        );
        assert_eq!(user.is_enrolled_in_2sv, Some(false));
        assert!(user.organizations.as_ref().unwrap().is_array());
        assert_eq!(page.next_token(), Some("token-2"));
    }

    #[test]
    fn test_empty_next_page_token_ends_pagination() {
        let page: UsersPage =
            serde_json::from_value(serde_json::json!({"users": [], "nextPageToken": ""})).unwrap();
        assert_eq!(page.next_token(), None);

        let page: UsersPage = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(page.users.is_empty());
        assert_eq!(page.next_token(), None);
    }

    #[test]
    fn test_struct_fields_match_serialized_keys() {
        // 每個宣告的欄位都必須是序列化後真正存在的 key
        let user = RawUser {
            id: "1".to_string(),
            primary_email: Some("a@example.com".to_string()),
            is_enrolled_in_2sv: Some(true),
            is_enforced_in_2sv: Some(true),
            thumbnail_photo_url: Some("https://example.com/p.png".to_string()),
            thumbnail_photo_etag: Some("etag-1".to_string()),
            is_guest_user: Some(false),
            gender: Some(serde_json::json!({"type": "female"})),
            ims: Some(serde_json::json!([{"im": "ann"}])),
            keywords: Some(serde_json::json!([{"value": "k"}])),
            locations: Some(serde_json::json!([{"area": "desk"}])),
            notes: Some(serde_json::json!({"value": "note"})),
            posix_accounts: Some(serde_json::json!([{"uid": 1000}])),
            ssh_public_keys: Some(serde_json::json!([{"key": "ssh-ed25519 AAA"}])),
            websites: Some(serde_json::json!([{"value": "https://example.com"}])),
            ..Default::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        for key in [
            "id",
            "primaryEmail",
            "isEnrolledIn2Sv",
            "isEnforcedIn2Sv",
            "thumbnailPhotoUrl",
            "thumbnailPhotoEtag",
            "isGuestUser",
            "gender",
            "ims",
            "keywords",
            "locations",
            "notes",
            "posixAccounts",
            "sshPublicKeys",
            "websites",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
            assert!(RawUser::FIELDS.iter().any(|f| f.json_key == key));
        }
    }

    #[test]
    fn test_user_without_id_still_decodes() {
        let page: UsersPage = serde_json::from_value(serde_json::json!({
            "users": [{"id": "u1"}, {"primaryEmail": "x@example.com"}]
        }))
        .unwrap();

        assert_eq!(page.users.len(), 2);
        assert_eq!(page.users[0].id, "u1");
        assert_eq!(page.users[1].id, "");
        assert_eq!(page.users[1].primary_email.as_deref(), Some("x@example.com"));
    }

    #[test]
    fn test_less_common_user_fields_are_kept() {
        let user: RawUser = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "thumbnailPhotoEtag": "etag-1",
            "isGuestUser": false,
            "gender": {"type": "other", "customGender": "n/a"},
            "posixAccounts": [{"username": "ann", "uid": "1000"}],
            "notes": {"value": "on leave", "contentType": "text_plain"}
        }))
        .unwrap();

        assert_eq!(user.thumbnail_photo_etag.as_deref(), Some("etag-1"));
        assert_eq!(user.is_guest_user, Some(false));
        assert_eq!(user.gender.as_ref().unwrap()["type"], "other");
        assert!(user.posix_accounts.as_ref().unwrap().is_array());
        assert_eq!(user.notes.as_ref().unwrap()["value"], "on leave");
    }
}
