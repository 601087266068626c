// Builds the wire request from a setup context, a method and a resolved URL.

use reqwest::Url;

use crate::errors::{ConfigError, Result};
use crate::setup::{FileContent, NameValues, SetupContext};
use crate::transport::{HttpMethod, RequestBody, TransportRequest};

pub(crate) fn build_request(
    setup: &SetupContext,
    method: HttpMethod,
    url: &Url,
) -> Result<TransportRequest> {
    let mut url = url.clone();
    merge_query(&mut url, setup.get_queries());

    let mut request = TransportRequest::new(method, url);
    request.accept = setup.header_accept();
    request.accept_encoding = setup.header_accept_encoding();
    request.accept_charset = setup.header_accept_charset();
    request.headers = setup.header_for_everything_else();
    request.cookie = setup.get_cookies().to_cookie_header();
    request.body = select_body(setup, method)?;
    request.timeout = setup.get_timeout();

    Ok(request)
}

/// Query already present in the URL first, kept byte for byte, then the
/// accumulated pairs. A URL with nothing to add is left untouched.
fn merge_query(url: &mut Url, queries: &NameValues) {
    let added = queries.to_query_string();
    if added.is_empty() {
        return;
    }

    let query = match url.query().filter(|existing| !existing.is_empty()) {
        Some(existing) => format!("{}&{}", existing.trim_end_matches('&'), added),
        None => added,
    };
    url.set_query(Some(query.as_str()));
}

/// files > form fields > raw body > nothing. GET never carries a body.
fn select_body(setup: &SetupContext, method: HttpMethod) -> Result<RequestBody> {
    if !method.allows_body() {
        return Ok(RequestBody::Empty);
    }

    let files = setup.get_files();
    let params = setup.get_params();

    if !files.is_empty() {
        files.iter().try_for_each(check_file_part)?;
        return Ok(RequestBody::Multipart {
            fields: params.to_vec(),
            files: files.to_vec(),
        });
    }

    if !params.is_empty() {
        return Ok(RequestBody::Form(params.to_vec()));
    }

    match setup.get_body().filter(|body| !body.is_empty()) {
        Some(body) => Ok(RequestBody::Text {
            content: body.to_string(),
            content_type: setup.header_content_type().into_iter().next(),
        }),
        None => Ok(RequestBody::Empty),
    }
}

// type/subtype, nothing else is accepted by the multipart encoder.
fn check_file_part(file: &FileContent) -> std::result::Result<(), ConfigError> {
    let valid = file
        .content_type
        .split_once('/')
        .map_or(false, |(kind, subtype)| !kind.trim().is_empty() && !subtype.trim().is_empty());

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidFilePart {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
        })
    }
}
