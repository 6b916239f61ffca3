mod common;
mod concurrency;
mod dispatch;
