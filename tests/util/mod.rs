#![allow(dead_code)]

pub mod ptr_key;
pub mod weak_identity_map;
