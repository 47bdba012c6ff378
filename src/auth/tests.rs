use super::*;

fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value.parse().unwrap());
    headers
}

#[test]
fn user_id_from_bearer_header() {
    assert_eq!(
        extract_bearer_token(&headers("Bearer user-1")),
        Ok("user-1".to_string())
    );
}

#[test]
fn scheme_is_case_insensitive_and_token_trimmed() {
    assert_eq!(
        extract_bearer_token(&headers("bearer    user-1  ")),
        Ok("user-1".to_string())
    );
    assert_eq!(
        extract_bearer_token(&headers("BEARER user-1")),
        Ok("user-1".to_string())
    );
}

#[test]
fn missing_header() {
    assert_eq!(
        extract_bearer_token(&HeaderMap::new()),
        Err(TokenError::Missing)
    );
}

#[test]
fn other_schemes_are_rejected() {
    // The marketplace's own scheme is not a local identity
    assert_eq!(
        extract_bearer_token(&headers("OneTimeCode otc-1")),
        Err(TokenError::InvalidFormat)
    );
    assert_eq!(
        extract_bearer_token(&headers("Basic dXNlcjpwYXNz")),
        Err(TokenError::InvalidFormat)
    );
}

#[test]
fn scheme_without_token() {
    assert_eq!(
        extract_bearer_token(&headers("Bearer")),
        Err(TokenError::InvalidFormat)
    );
    assert_eq!(
        extract_bearer_token(&headers("Bearer   ")),
        Err(TokenError::Empty)
    );
    assert_eq!(
        extract_bearer_token(&headers("")),
        Err(TokenError::InvalidFormat)
    );
}

#[test]
fn error_messages() {
    assert_eq!(
        TokenError::Missing.to_string(),
        "Authorization header not provided"
    );
    assert_eq!(TokenError::Empty.to_string(), "Bearer token is empty");
}
