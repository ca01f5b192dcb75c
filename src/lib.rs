/*!
# Easy Eat

A small recipe-management web application built in Rust.

## Overview

Users authenticate, browse and search recipes, add or delete recipes, and
administrators manage users and roles. Persistence is a worksheet used as a
row-oriented database: row 1 is the header, data starts at row 2, and every
page render reloads its table from the sheet.

## Architecture

- **Backend**: Rust, axum, tokio
- **Worksheet adapter**: loads sheets into in-memory tables and performs
  append/find/update/delete against the backing sheet
- **Search engine**: case-insensitive substring terms, ANDed across cells
- **Auth**: Argon2 password hashing, cookie-backed sessions, role-gated
  navigation over `admin` / `user` / `demo`

## Modules

- **sheet**: worksheet boundary, in-memory tables and row synchronization
- **search**: free-text and column filtering over tables
- **recipes**: recipe add/delete services
- **users**: user records, role changes and deletion
- **login**: authentication, registration and session management
- **nav**: roles and role-gated navigation
- **config**: static application configuration
- **error**: failure taxonomy shared by all of the above
- **app**: routing, shared state and view handlers
*/

pub mod app;
pub mod config;
pub mod error;
pub mod login;
pub mod nav;
pub mod recipes;
pub mod search;
pub mod sheet;
pub mod users;

/// Re-export everything from these modules to make it easier to use
pub use error::*;
pub use login::*;
pub use nav::*;
pub use recipes::*;
pub use search::*;
pub use sheet::*;
pub use users::*;
