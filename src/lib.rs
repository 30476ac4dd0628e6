// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

mod charwithposition;
mod lexer;
mod peekableiter;

pub mod code;
pub mod element;
pub mod error;
pub mod location;
pub mod modifier;
pub mod regexp;
pub mod search;
pub mod token;
pub mod tokenizer;
pub mod version;
pub mod width;

pub use regexp::{ParseOptions, Regexp};
