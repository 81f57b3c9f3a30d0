//! Cross-cutting invariants and the six concrete scenarios the reader must
//! satisfy. Each test function names the invariant/scenario it covers
//! rather than restating it in prose.

use fastframe::{Column, ColumnType, HeaderMode, ReadOptions, read_table};

fn col_i32(table: &fastframe::Table, name: &str) -> Vec<Option<i32>> {
    match table.column(name).unwrap() {
        Column::Int32(v) => v.clone(),
        other => panic!("expected Int32, got {:?}", other.column_type()),
    }
}

fn col_str(table: &fastframe::Table, name: &str) -> Vec<Option<String>> {
    match table.column(name).unwrap() {
        Column::Str(v) => v.clone(),
        other => panic!("expected Str, got {:?}", other.column_type()),
    }
}

#[test]
fn s1_basic_dialect_and_types() {
    let input = b"a,b,c\n1,2,3\n4,5,6\n".to_vec();
    let table = read_table(ReadOptions::from_bytes(input)).unwrap();
    assert_eq!(table.names, vec!["a", "b", "c"]);
    assert_eq!(table.nrow(), 2);
    assert_eq!(col_i32(&table, "a"), vec![Some(1), Some(4)]);
    assert_eq!(col_i32(&table, "b"), vec![Some(2), Some(5)]);
    assert_eq!(col_i32(&table, "c"), vec![Some(3), Some(6)]);
}

#[test]
fn s2_quoted_newline_preserved_in_string_column() {
    let input = b"x\n\"a\nb\"\nc\n".to_vec();
    let opts = ReadOptions::from_bytes(input);
    let table = read_table(opts).unwrap();
    assert_eq!(table.nrow(), 2);
    let values = col_str(&table, "x");
    assert_eq!(values, vec![Some("a\nb".to_string()), Some("c".to_string())]);
}

#[test]
fn s3_out_of_sample_float_triggers_bump_and_reread() {
    let mut buf = Vec::new();
    for i in 0..9_999 {
        buf.extend_from_slice(format!("{i}\n").as_bytes());
    }
    buf.extend_from_slice(b"3.14\n");
    let opts = ReadOptions::from_bytes(buf).header(HeaderMode::False);
    let table = read_table(opts).unwrap();
    assert_eq!(table.nrow(), 10_000);
    match table.column("V1").unwrap() {
        Column::Float64(v) => {
            assert_eq!(v.len(), 10_000);
            assert_eq!(v[0], Some(0.0));
            assert_eq!(v[9_998], Some(9_998.0));
            assert_eq!(v[9_999], Some(3.14));
        }
        other => panic!("expected Float64 after bump, got {:?}", other.column_type()),
    }
}

#[test]
fn s4_embedded_doubled_quote_unescapes() {
    let input = b"s\n\"he said \"\"hi\"\"\"\n".to_vec();
    let table = read_table(ReadOptions::from_bytes(input)).unwrap();
    assert_eq!(table.nrow(), 1);
    assert_eq!(col_str(&table, "s"), vec![Some("he said \"hi\"".to_string())]);
}

#[test]
fn s5_na_strings_control_missing_vs_literal_value() {
    let input = b"a,b\n1,-999\n2,3\n".to_vec();
    let with_literal_na = ReadOptions::from_bytes(input.clone())
        .na_strings(vec![String::new(), "NA".to_string(), "-999".to_string()])
        .unwrap();
    let table = read_table(with_literal_na).unwrap();
    assert_eq!(col_i32(&table, "b"), vec![None, Some(3)]);

    let without_minus_999 = ReadOptions::from_bytes(input)
        .na_strings(vec![String::new()])
        .unwrap();
    let table2 = read_table(without_minus_999).unwrap();
    assert_eq!(col_i32(&table2, "b"), vec![Some(-999), Some(3)]);
}

#[test]
fn s6_fill_mode_pads_short_rows_with_na() {
    let input = b"a,b,c\n1,2,3\n4,5\n".to_vec();
    let opts = ReadOptions::from_bytes(input).fill(true);
    let table = read_table(opts).unwrap();
    assert_eq!(table.nrow(), 2);
    assert_eq!(col_i32(&table, "c"), vec![Some(3), None]);
}

#[test]
fn s6_fill_false_is_a_shape_error_naming_the_line() {
    let input = b"a,b,c\n1,2,3\n4,5\n".to_vec();
    let opts = ReadOptions::from_bytes(input).fill(false);
    let err = read_table(opts).unwrap_err();
    match err {
        fastframe::ReadError::TooFewFields { found, expected, .. } => {
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("expected TooFewFields, got {other:?}"),
    }
}

#[test]
fn invariant_row_count_is_contiguous_across_chunks() {
    let mut buf = Vec::new();
    for i in 0..500 {
        buf.extend_from_slice(format!("{i},{}\n", i * 2).as_bytes());
    }
    let opts = ReadOptions::from_bytes(buf).header(HeaderMode::False).nth(6).unwrap();
    let table = read_table(opts).unwrap();
    assert_eq!(table.nrow(), 500);
    let col0 = col_i32(&table, "V1");
    for (i, v) in col0.iter().enumerate() {
        assert_eq!(*v, Some(i as i32));
    }
}

#[test]
fn invariant_single_thread_matches_multi_thread() {
    let mut buf = Vec::new();
    for i in 0..777 {
        buf.extend_from_slice(format!("{i},val{i}\n").as_bytes());
    }
    let single = read_table(
        ReadOptions::from_bytes(buf.clone())
            .header(HeaderMode::False)
            .nth(1)
            .unwrap(),
    )
    .unwrap();
    let multi = read_table(
        ReadOptions::from_bytes(buf)
            .header(HeaderMode::False)
            .nth(8)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(single.nrow(), multi.nrow());
    assert_eq!(col_i32(&single, "V1"), col_i32(&multi, "V1"));
    assert_eq!(col_str(&single, "V2"), col_str(&multi, "V2"));
}

#[test]
fn invariant_nrow_limit_caps_output_rows() {
    let mut buf = Vec::new();
    for i in 0..100 {
        buf.extend_from_slice(format!("{i}\n").as_bytes());
    }
    let opts = ReadOptions::from_bytes(buf)
        .header(HeaderMode::False)
        .nrow_limit(17);
    let table = read_table(opts).unwrap();
    assert_eq!(table.nrow(), 17);
}

#[test]
fn invariant_types_never_narrow_from_sample_to_final() {
    // Sampled rows are all small integers; body contains nothing wider, so
    // the final type must still be at least as wide as every scanner that
    // actually matched during sampling (here: INT32 the whole way through).
    let input = b"1\n2\n3\n4\n5\n".to_vec();
    let opts = ReadOptions::from_bytes(input).header(HeaderMode::False);
    let table = read_table(opts).unwrap();
    assert_eq!(table.columns[0].column_type(), ColumnType::Int32);
}
