mod key_fields;
mod lifecycle;
mod search;
