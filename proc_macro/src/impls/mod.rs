pub(crate) mod trace_row;
