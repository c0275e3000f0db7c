mod support;

use chrono::{TimeDelta, Utc};
use roominate_auth::{Credential, RequestAuthorizer, RestClient, Table, TokenTier};
use support::memory_store;
use url::Url;

const ANON_KEY: &str = "anon-public-key";

fn build(authorizer: &RequestAuthorizer, method: reqwest::Method) -> reqwest::Request {
    let request = reqwest::Client::new().request(
        method,
        "https://abc.supabase.co/rest/v1/boarding_houses?select=*",
    );
    authorizer.authorize(request).build().unwrap()
}

#[test]
fn empty_store_sends_only_the_anon_key() {
    let authorizer = RequestAuthorizer::new(ANON_KEY, memory_store(TokenTier::Plain));

    for method in [reqwest::Method::GET, reqwest::Method::POST, reqwest::Method::PATCH] {
        let request = build(&authorizer, method);
        assert_eq!(request.headers()["apikey"], ANON_KEY);
        assert_eq!(
            request.headers()["Authorization"],
            format!("Bearer {ANON_KEY}").as_str()
        );
    }
}

#[test]
fn valid_session_token_replaces_anon_bearer() {
    let store = memory_store(TokenTier::Plain);
    store
        .save("user-access", Some("user-refresh"), Some("bearer"), 3600)
        .unwrap();
    let authorizer = RequestAuthorizer::new(ANON_KEY, store);

    let request = build(&authorizer, reqwest::Method::GET);
    assert_eq!(request.headers()["Authorization"], "Bearer user-access");
    // apikey stays the anonymous key even with a user session.
    assert_eq!(request.headers()["apikey"], ANON_KEY);
}

#[test]
fn expired_token_is_never_sent() {
    let store = memory_store(TokenTier::Plain);
    store.save("stale-access", None, None, 0).unwrap();
    let authorizer = RequestAuthorizer::new(ANON_KEY, store.clone());

    std::thread::sleep(std::time::Duration::from_millis(5));
    let request = build(&authorizer, reqwest::Method::GET);
    let bearer = request.headers()["Authorization"].to_str().unwrap().to_string();
    assert!(!bearer.contains("stale-access"));
    assert_eq!(bearer, format!("Bearer {ANON_KEY}"));

    // Building the request did not touch the store.
    assert_eq!(store.read().unwrap().access_token, "stale-access");
}

#[test]
fn decision_follows_the_store_between_requests() {
    let store = memory_store(TokenTier::Plain);
    let authorizer = RequestAuthorizer::new(ANON_KEY, store.clone());

    assert_eq!(authorizer.credential(), Credential::Anonymous);

    store.save("fresh", None, None, 60).unwrap();
    assert_eq!(authorizer.credential(), Credential::User("fresh".to_string()));

    let in_two_minutes = Utc::now() + TimeDelta::seconds(120);
    assert_eq!(authorizer.credential_at(in_two_minutes), Credential::Anonymous);

    store.clear().unwrap();
    assert_eq!(authorizer.credential(), Credential::Anonymous);
}

#[test]
fn oauth_tier_authorises_when_no_password_session() {
    let plain = memory_store(TokenTier::Plain);
    let oauth = memory_store(TokenTier::Encrypted);
    oauth.save("oauth-access", None, Some("bearer"), 3600).unwrap();

    let authorizer = RequestAuthorizer::new(ANON_KEY, plain).with_store(oauth);
    let request = build(&authorizer, reqwest::Method::GET);
    assert_eq!(request.headers()["Authorization"], "Bearer oauth-access");
}

#[test]
fn rest_urls_carry_postgrest_filters() {
    let client = RestClient::new(
        reqwest::Client::new(),
        Url::parse("https://abc.supabase.co").unwrap(),
        RequestAuthorizer::new(ANON_KEY, memory_store(TokenTier::Plain)),
    );

    let url = client
        .table_url(Table::Favorites, &[("user_id", "u-1")])
        .unwrap();
    assert_eq!(
        url.as_str(),
        "https://abc.supabase.co/rest/v1/favorites?user_id=eq.u-1"
    );
}
