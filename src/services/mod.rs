pub(crate) mod question_import;
