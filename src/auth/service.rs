//! Token verification, permission checks and the auth-only endpoints
//! (`createUser`, `login`, `validate`, `permission`).

use axum::http::HeaderMap;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::password::{self, is_valid_email, PasswordPolicy};
use super::permission::PermissionGraph;
use super::{extract_token, AuthError, Claims, JwtKeys};
use crate::baton::{Baton, ErrorRecord, Halt, StageResult};
use crate::config::SecurityConfig;
use crate::database::{Database, Row, SelectParams};
use crate::error::ApiError;
use crate::schema::tables;
use crate::validation::{parse_integer, ValidatedParams};

/// Digits in generated user ids.
const USER_ID_LENGTH: u32 = 10;

pub const INVALID_USERNAME: &str = "Invalid Username";
pub const INVALID_EMAIL_FORMAT: &str = "Invalid Email Format";
pub const INVALID_EMAIL: &str = "Invalid Email";
pub const INVALID_PASSWORD: &str = "Invalid Password";
pub const WEAK_PASSWORD: &str = "Invalid Password,Please fuitfil requirements";
pub const EMAIL_TAKEN: &str = "Email Already Registered";
pub const CREDENTIAL_REQUIRED: &str = "Username Or Email Required";

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    keys: JwtKeys,
    policy: PasswordPolicy,
    allow_test_mode: bool,
    audit: bool,
}

impl AuthService {
    pub fn new(db: Database, keys: JwtKeys, policy: PasswordPolicy) -> Self {
        Self {
            db,
            keys,
            policy,
            allow_test_mode: false,
            audit: false,
        }
    }

    pub fn from_config(db: Database, security: &SecurityConfig) -> Result<Self, AuthError> {
        Ok(Self {
            allow_test_mode: security.allow_test_mode,
            audit: security.enable_audit_logging,
            ..Self::new(db, JwtKeys::from_config(security)?, PasswordPolicy::from_config(security))
        })
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    fn domain_error(baton: &mut Baton, message: &str) -> Halt {
        let action = baton.action.clone();
        baton.fail(ErrorRecord::new(ApiError::domain(message)).action(action))
    }

    /// Gate for regular actions: verify the token, then require an edge from
    /// the caller's role to `baton.action`. A test-mode request skips both
    /// when the deployment allows it, leaving the identity unset.
    pub async fn authorize(&self, baton: &mut Baton, headers: &HeaderMap, test_mode: bool) -> StageResult<()> {
        baton.add_method("authValidate");
        if test_mode {
            if self.allow_test_mode {
                debug!("[{}] test mode, skipping auth", baton.id);
                return Ok(());
            }
            warn!("[{}] test_mode requested but not allowed", baton.id);
        }

        self.authenticate(baton, headers)?;
        let action = baton.action.clone();
        self.check_permission(baton, &action).await?;
        Ok(())
    }

    /// Verify the request token and record the caller identity on the baton.
    pub fn authenticate(&self, baton: &mut Baton, headers: &HeaderMap) -> StageResult<Claims> {
        baton.add_method("authenticate");
        let verified = extract_token(headers).and_then(|token| self.keys.verify(&token));
        match verified {
            Ok(claims) => {
                baton.user_id = Some(claims.user_id);
                baton.user_role = claims.user_role;
                Ok(claims)
            }
            Err(err) => {
                warn!("[{}] auth failed: {}", baton.id, err);
                let action = baton.action.clone();
                Err(baton.fail(
                    ErrorRecord::new(ApiError::AuthTokenInvalid)
                        .action(action)
                        .detail(err.to_string()),
                ))
            }
        }
    }

    /// Require an edge from the baton's role to `action_name`.
    pub async fn check_permission(&self, baton: &mut Baton, action_name: &str) -> StageResult<PermissionGraph> {
        baton.add_method("checkPermission");
        let graph = PermissionGraph::load(&self.db, baton).await?;
        if graph.is_permitted(baton.user_role, action_name) {
            return Ok(graph);
        }

        warn!(
            "[{}] permission denied: role {:?} -> {}",
            baton.id, baton.user_role, action_name
        );
        let detail = match graph.action_id(action_name) {
            Some(_) => "role has no edge to action",
            None => "unknown action",
        };
        Err(baton.fail(
            ErrorRecord::new(ApiError::PermissionDenied)
                .action(action_name)
                .detail(detail),
        ))
    }

    /// `validate?action=`: token valid and the role may run `action`.
    pub async fn validate(&self, baton: &mut Baton, headers: &HeaderMap, params: &ValidatedParams) -> StageResult<()> {
        self.authenticate(baton, headers)?;
        let action = params.str("action").unwrap_or_default().to_string();
        self.check_permission(baton, &action).await?;
        baton.json(json!({
            "auth_validated": true,
            "user_id": baton.user_id,
        }));
        Ok(())
    }

    /// With `action`: check that one edge. Without: list what the role may run.
    pub async fn permission(&self, baton: &mut Baton, headers: &HeaderMap, params: &ValidatedParams) -> StageResult<()> {
        self.authenticate(baton, headers)?;
        match params.str("action") {
            Some(action) => {
                let action = action.to_string();
                self.check_permission(baton, &action).await?;
                baton.json(json!({
                    "permission_granted": true,
                    "action": action,
                }));
            }
            None => {
                let graph = PermissionGraph::load(&self.db, baton).await?;
                let permitted = baton
                    .user_role
                    .map(|role| graph.permitted_actions(role))
                    .unwrap_or_default();
                baton.json(json!({
                    "user_role": baton.user_role,
                    "permitted_actions": permitted,
                }));
            }
        }
        Ok(())
    }

    pub async fn create_user(&self, baton: &mut Baton, params: &ValidatedParams) -> StageResult<()> {
        baton.add_method("createUser");
        let username = params.str("username").unwrap_or_default().to_string();
        let email = params.str("email").unwrap_or_default().to_string();
        let password = params.str("password").unwrap_or_default().to_string();

        if !is_valid_email(&email) {
            return Err(Self::domain_error(baton, INVALID_EMAIL_FORMAT));
        }
        if let Err(err) = self.policy.validate(&password) {
            debug!("[{}] {}", baton.id, err);
            return Err(Self::domain_error(baton, WEAK_PASSWORD));
        }

        let existing = self
            .db
            .get_user_data(baton, &SelectParams::new().eq_one("email", email.as_str()))
            .await?;
        if !existing.is_empty() {
            return Err(Self::domain_error(baton, EMAIL_TAKEN));
        }

        let ids = self
            .db
            .generate_custom_ids(baton, 1, USER_ID_LENGTH, tables::USER, "user_id")
            .await?;
        let user_id = ids[0];

        let hash = match password::hash_password(password).await {
            Ok(hash) => hash,
            Err(err) => {
                return Err(baton.fail(
                    ErrorRecord::new(ApiError::Storage)
                        .detail("Auth: password hashing failed")
                        .internal(err.to_string()),
                ))
            }
        };

        let mut row = Row::new();
        row.insert("user_id".to_string(), json!(user_id));
        row.insert("username".to_string(), json!(username));
        row.insert("email".to_string(), json!(email));
        row.insert("password".to_string(), json!(hash));
        self.db.insert_user(baton, &[row]).await?;

        if self.audit {
            info!("[{}] user created: {} ({})", baton.id, user_id, username);
        }
        baton.json(json!({
            "user_id": user_id,
            "username": username,
        }));
        Ok(())
    }

    /// Username takes precedence over email when both are given.
    pub async fn login(&self, baton: &mut Baton, params: &ValidatedParams) -> StageResult<()> {
        baton.add_method("login");
        let password = params.str("password").unwrap_or_default().to_string();

        let user = match (params.str("username"), params.str("email")) {
            (Some(username), _) => {
                let rows = self
                    .db
                    .get_user_data(baton, &SelectParams::new().eq_one("username", username))
                    .await?;
                self.first_user(baton, rows, INVALID_USERNAME)?
            }
            (None, Some(email)) => {
                if !is_valid_email(email) {
                    return Err(Self::domain_error(baton, INVALID_EMAIL_FORMAT));
                }
                let rows = self
                    .db
                    .get_user_data(baton, &SelectParams::new().eq_one("email", email))
                    .await?;
                self.first_user(baton, rows, INVALID_EMAIL)?
            }
            (None, None) => return Err(Self::domain_error(baton, CREDENTIAL_REQUIRED)),
        };

        let stored = user.get("password").and_then(Value::as_str).unwrap_or_default().to_string();
        if !password::verify_password(password, stored).await {
            return Err(Self::domain_error(baton, INVALID_PASSWORD));
        }

        let Some(user_id) = user.get("user_id").and_then(parse_integer) else {
            return Err(baton.fail(
                ErrorRecord::new(ApiError::Storage).detail("Auth: user record has no id"),
            ));
        };
        let user_role = user.get("role").and_then(parse_integer);

        let claims = self.keys.claims_for(user_id, user_role);
        let token = match self.keys.sign(&claims) {
            Ok(token) => token,
            Err(err) => {
                return Err(baton.fail(
                    ErrorRecord::new(ApiError::Storage)
                        .detail("Auth: token signing failed")
                        .internal(err.to_string()),
                ))
            }
        };

        if self.audit {
            info!("[{}] login: user {}", baton.id, user_id);
        }
        baton.json(json!({ "auth_token": token }));
        Ok(())
    }

    fn first_user(&self, baton: &mut Baton, rows: Vec<Row>, not_found: &str) -> StageResult<Map<String, Value>> {
        match rows.into_iter().next() {
            Some(user) => Ok(user),
            None => Err(Self::domain_error(baton, not_found)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baton::RequestType;
    use crate::database::MemoryExecutor;
    use crate::schema::SchemaRegistry;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::Arc;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn params(value: Value) -> ValidatedParams {
        ValidatedParams::from(value.as_object().cloned().unwrap())
    }

    fn service() -> (Arc<MemoryExecutor>, AuthService) {
        let memory = Arc::new(MemoryExecutor::new());
        memory.seed(tables::ROLE, [row(json!({ "role_id": 0, "role_name": "Admin" })), row(json!({ "role_id": 1, "role_name": "Other" }))]);
        memory.seed(
            tables::ACTION,
            [
                row(json!({ "action_id": 101, "action_name": "testGetCall" })),
                row(json!({ "action_id": 102, "action_name": "testPostCall" })),
            ],
        );
        memory.seed(
            tables::ROLE_ACTION,
            [
                row(json!({ "role_id": 0, "action_id": 101 })),
                row(json!({ "role_id": 0, "action_id": 102 })),
                row(json!({ "role_id": 1, "action_id": 101 })),
            ],
        );
        let db = Database::new(Arc::new(SchemaRegistry::standard()), memory.clone());
        let keys = JwtKeys::new("test-secret", 1).unwrap();
        (memory, AuthService::new(db, keys, PasswordPolicy::default()))
    }

    fn bearer(service: &AuthService, user_id: i64, role: Option<i64>) -> HeaderMap {
        let token = service.keys().sign(&service.keys().claims_for(user_id, role)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("auth_token", HeaderValue::from_str(&token).unwrap());
        headers
    }

    fn message(baton: &Baton) -> String {
        baton.response().unwrap().body["error_message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_user_then_login() {
        let (memory, service) = service();

        let mut baton = Baton::create("c1", "createUser", Value::Null);
        service
            .create_user(&mut baton, &params(json!({ "username": "u1", "email": "u1@test.com", "password": "Strong1Pass" })))
            .await
            .unwrap();
        let body = &baton.response().unwrap().body;
        assert_eq!(body["username"], "u1");
        assert!(body["user_id"].is_i64());

        let users = memory.rows(tables::USER);
        assert_eq!(users.len(), 1);
        assert_ne!(users[0]["password"], "Strong1Pass");
        assert_eq!(users[0]["role"], Value::Null);

        let mut baton = Baton::create("l1", "login", Value::Null);
        service
            .login(&mut baton, &params(json!({ "username": "u1", "password": "Strong1Pass" })))
            .await
            .unwrap();
        let token = baton.response().unwrap().body["auth_token"].as_str().unwrap().to_string();
        let claims = service.keys().verify(&token).unwrap();
        assert_eq!(json!(claims.user_id), body["user_id"]);
        assert_eq!(claims.user_role, None);
    }

    #[tokio::test]
    async fn create_user_rejections() {
        let (memory, service) = service();
        memory.seed(tables::USER, [row(json!({ "user_id": 1, "username": "a", "email": "taken@test.com", "password": "x", "role": 1 }))]);

        let cases = [
            (json!({ "username": "u", "email": "bad", "password": "Strong1Pass" }), INVALID_EMAIL_FORMAT),
            (json!({ "username": "u", "email": "u@test.com", "password": "weak" }), WEAK_PASSWORD),
            (json!({ "username": "u", "email": "taken@test.com", "password": "Strong1Pass" }), EMAIL_TAKEN),
        ];
        for (input, expected) in cases {
            let mut baton = Baton::create("c", "createUser", Value::Null);
            assert!(service.create_user(&mut baton, &params(input)).await.is_err());
            assert_eq!(message(&baton), expected);
            assert_eq!(baton.response().unwrap().status, StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(memory.rows(tables::USER).len(), 1);
    }

    #[tokio::test]
    async fn login_failures() {
        let (memory, service) = service();
        let hash = password::hash_password_blocking("Testing").unwrap();
        memory.seed(tables::USER, [row(json!({ "user_id": 1000000001, "username": "firstUser", "email": "first@test.com", "password": hash, "role": 0 }))]);

        let cases = [
            (json!({ "username": "nobody", "password": "Testing" }), INVALID_USERNAME),
            (json!({ "username": "firstUser", "password": "wrong" }), INVALID_PASSWORD),
            (json!({ "email": "not-an-email", "password": "Testing" }), INVALID_EMAIL_FORMAT),
            (json!({ "email": "other@test.com", "password": "Testing" }), INVALID_EMAIL),
            (json!({ "password": "Testing" }), CREDENTIAL_REQUIRED),
        ];
        for (input, expected) in cases {
            let mut baton = Baton::create("l", "login", Value::Null);
            assert!(service.login(&mut baton, &params(input)).await.is_err());
            assert_eq!(message(&baton), expected);
        }

        let mut baton = Baton::create("l", "login", Value::Null);
        service
            .login(&mut baton, &params(json!({ "email": "first@test.com", "password": "Testing" })))
            .await
            .unwrap();
        let token = baton.response().unwrap().body["auth_token"].as_str().unwrap().to_string();
        assert_eq!(service.keys().verify(&token).unwrap().user_role, Some(0));
    }

    #[tokio::test]
    async fn authorize_checks_token_then_edge() {
        let (_, service) = service();

        let mut baton = Baton::create("a", "testPostCall", Value::Null).with_request_type(RequestType::Post);
        service.authorize(&mut baton, &bearer(&service, 7, Some(0)), false).await.unwrap();
        assert_eq!(baton.user_id, Some(7));
        assert!(!baton.is_answered());

        let mut baton = Baton::create("a", "testPostCall", Value::Null);
        assert!(service.authorize(&mut baton, &bearer(&service, 7, Some(1)), false).await.is_err());
        assert_eq!(message(&baton), "Permission Denied");
        assert_eq!(baton.response().unwrap().status, StatusCode::INTERNAL_SERVER_ERROR);

        let mut baton = Baton::create("a", "testGetCall", Value::Null);
        assert!(service.authorize(&mut baton, &HeaderMap::new(), false).await.is_err());
        assert_eq!(message(&baton), "Auth token invalid");
        assert_eq!(baton.response().unwrap().status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mode_only_when_allowed() {
        let (_, mut service) = service();

        let mut baton = Baton::create("t", "testGetCall", Value::Null);
        assert!(service.authorize(&mut baton, &HeaderMap::new(), true).await.is_err());

        service.allow_test_mode = true;
        let mut baton = Baton::create("t", "testGetCall", Value::Null);
        service.authorize(&mut baton, &HeaderMap::new(), true).await.unwrap();
        assert_eq!(baton.user_id, None);
    }

    #[tokio::test]
    async fn permission_lists_or_checks() {
        let (_, service) = service();
        let headers = bearer(&service, 9, Some(1));

        let mut baton = Baton::create("p", "permission", Value::Null);
        service.permission(&mut baton, &headers, &ValidatedParams::default()).await.unwrap();
        assert_eq!(baton.response().unwrap().body["permitted_actions"], json!(["testGetCall"]));

        let mut baton = Baton::create("p", "permission", Value::Null);
        service
            .permission(&mut baton, &headers, &params(json!({ "action": "testGetCall" })))
            .await
            .unwrap();
        assert_eq!(baton.response().unwrap().body["permission_granted"], true);

        let mut baton = Baton::create("v", "validate", Value::Null);
        assert!(service
            .validate(&mut baton, &headers, &params(json!({ "action": "testPostCall" })))
            .await
            .is_err());
        assert_eq!(message(&baton), "Permission Denied");

        let mut baton = Baton::create("v", "validate", Value::Null);
        service
            .validate(&mut baton, &headers, &params(json!({ "action": "testGetCall" })))
            .await
            .unwrap();
        assert_eq!(baton.response().unwrap().body, json!({ "auth_validated": true, "user_id": 9 }));
    }
}
