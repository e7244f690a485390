// ============================
// crates/backend-lib/src/web/pages.rs
// ============================
//! Minimal HTML pages for the browser flows.
use crate::storage::Account;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

fn error_block(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\">{}</p>\n", escape(e)))
        .unwrap_or_default()
}

pub fn login(error: Option<&str>) -> String {
    layout(
        "Log in",
        &format!(
            "<h1>Log in</h1>\n{}<form method=\"post\" action=\"/login\">\n\
             <input name=\"login\" placeholder=\"Login\">\n\
             <input name=\"password\" type=\"password\" placeholder=\"Password\">\n\
             <label><input name=\"remember_me\" type=\"checkbox\"> Remember me</label>\n\
             <button type=\"submit\">Log in</button>\n</form>\n\
             <a href=\"/signup\">Sign up</a>",
            error_block(error)
        ),
    )
}

pub fn signup(error: Option<&str>) -> String {
    layout(
        "Sign up",
        &format!(
            "<h1>Sign up</h1>\n{}<form method=\"post\" action=\"/signup\">\n\
             <input name=\"login\" placeholder=\"Login\">\n\
             <input name=\"email\" type=\"email\" placeholder=\"Email\">\n\
             <input name=\"password\" type=\"password\" placeholder=\"Password\">\n\
             <input name=\"confirm_password\" type=\"password\" placeholder=\"Confirm password\">\n\
             <button type=\"submit\">Sign up</button>\n</form>\n\
             <a href=\"/login\">Log in</a>",
            error_block(error)
        ),
    )
}

pub fn home(account: &Account) -> String {
    layout(
        "Home",
        &format!(
            "<h1>Hello, {}</h1>\n<ul>\n\
             <li><a href=\"/users\">Users</a></li>\n\
             <li><a href=\"/update\">Edit profile</a></li>\n\
             <li><a href=\"/delete\">Delete account</a></li>\n\
             <li><a href=\"/logout\">Log out</a></li>\n</ul>",
            escape(&account.login)
        ),
    )
}

pub fn update(account: &Account, error: Option<&str>) -> String {
    layout(
        "Edit profile",
        &format!(
            "<h1>Edit profile</h1>\n<p>{} &lt;{}&gt;</p>\n{}<p>Fill in exactly one field.</p>\n\
             <form method=\"post\" action=\"/update\">\n\
             <input name=\"new_login\" placeholder=\"New login\">\n\
             <input name=\"new_email\" type=\"email\" placeholder=\"New email\">\n\
             <input name=\"new_password\" type=\"password\" placeholder=\"New password\">\n\
             <button type=\"submit\">Save</button>\n</form>\n<a href=\"/\">Back</a>",
            escape(&account.login),
            escape(&account.email),
            error_block(error)
        ),
    )
}

pub fn delete(account: &Account) -> String {
    layout(
        "Delete account",
        &format!(
            "<h1>Delete account {}?</h1>\n<form method=\"post\" action=\"/delete\">\n\
             <button type=\"submit\">Delete</button>\n</form>\n<a href=\"/\">Cancel</a>",
            escape(&account.login)
        ),
    )
}
