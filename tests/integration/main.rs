//! Integration tests for Sumi-Harvest
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! engine end-to-end over real HTTP.

mod crawl_tests;
mod fetcher_tests;
mod sitemap_tests;
mod support;
