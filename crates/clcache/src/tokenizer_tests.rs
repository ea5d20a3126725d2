// SPDX-License-Identifier: MIT

use super::*;
use std::io::Write;
use tempfile::tempdir;

fn split(s: &str) -> Vec<String> {
    split_commands_file(s)
}

#[test]
fn empty_input_yields_no_tokens() {
    assert!(split("").is_empty());
}

fn v(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn microsoft_docs_examples() {
    assert_eq!(split(r#""abc" d e"#), v(&["abc", "d", "e"]));
    assert_eq!(split(r#"a\\\"b c d"#), v(&[r#"a\"b"#, "c", "d"]));
    assert_eq!(split(r#"a\\\\"b c" d e"#), v(&[r"a\\b c", "d", "e"]));
}

#[test]
fn quotes_around_argument_with_spaces() {
    assert_eq!(
        split(r#"/Fo"C:\out dir\main.obj""#),
        v(&[r"/FoC:\out dir\main.obj"])
    );
}

#[test]
fn double_quoted_adjacent_quotes_collapse() {
    assert_eq!(
        split(r#""/Fo"something\main.obj""#),
        v(&[r"/Fosomething\main.obj"])
    );
}

#[test]
fn backslash_before_quote_escapes_without_toggling_region() {
    assert_eq!(
        split(r#"/Fo"C:\out dir\""#),
        v(&[r#"/FoC:\out dir""#])
    );
    assert_eq!(
        split(r#"/Fo"C:\out dir\" /nologo"#),
        v(&[r#"/FoC:\out dir" /nologo"#])
    );
    assert_eq!(
        split(r#"/Fo"C:\out dir\\""#),
        v(&[r"/FoC:\out dir\"])
    );
}

#[test]
fn initial_backslash_is_literal() {
    assert_eq!(split(r"\foo.cpp"), v(&[r"\foo.cpp"]));
    assert_eq!(split(r"/nologo \foo.cpp"), v(&["/nologo", r"\foo.cpp"]));
}

#[test]
fn vyachselav_case() {
    let input = r#""-IC:\Program files\Some library" -DX=1 -DVERSION=\"1.0\" -I..\.. -I"..\..\lib" -DMYPATH=\"C:\Path\""#;
    assert_eq!(
        split(input),
        v(&[
            r"-IC:\Program files\Some library",
            "-DX=1",
            r#"-DVERSION="1.0""#,
            r"-I..\..",
            r"-I..\..\lib",
            r#"-DMYPATH="C:\Path""#,
        ])
    );
}

#[test]
fn line_endings_split_tokens() {
    assert_eq!(split("-A\n-B"), v(&["-A", "-B"]));
    assert_eq!(split("-A\r\n-B"), v(&["-A", "-B"]));
    assert_eq!(
        split("-A -B\r\n-C -D -E"),
        v(&["-A", "-B", "-C", "-D", "-E"])
    );
}

#[test]
fn repeated_whitespace_collapses() {
    assert_eq!(split("-A -B    -C"), v(&["-A", "-B", "-C"]));
    assert_eq!(split("   -A -B -C"), v(&["-A", "-B", "-C"]));
    assert_eq!(split("-A -B -C   "), v(&["-A", "-B", "-C"]));
}

#[test]
fn extend_command_line_empty() {
    assert!(extend_command_line_from_environment(&[], None, None).is_empty());
}

#[test]
fn extend_command_line_unchanged_without_cl_vars() {
    let argv = v(&["/nologo"]);
    assert_eq!(
        extend_command_line_from_environment(&argv, None, None),
        argv
    );
}

#[test]
fn extend_command_line_prepends_cl() {
    let argv = v(&["/nologo"]);
    assert_eq!(
        extend_command_line_from_environment(&argv, Some("/MP"), None),
        v(&["/MP", "/nologo"])
    );
}

#[test]
fn extend_command_line_prepends_multiple_cl_tokens() {
    let argv = v(&["INPUT.C"]);
    assert_eq!(
        extend_command_line_from_environment(
            &argv,
            Some(r"/Zp2 /Ox /I\INCLUDE\MYINCLS \LIB\BINMODE.OBJ"),
            None
        ),
        v(&[
            "/Zp2",
            "/Ox",
            r"/I\INCLUDE\MYINCLS",
            r"\LIB\BINMODE.OBJ",
            "INPUT.C"
        ])
    );
}

#[test]
fn extend_command_line_appends_cl_extra() {
    let argv = v(&["/nologo"]);
    assert_eq!(
        extend_command_line_from_environment(&argv, None, Some("file.c")),
        v(&["/nologo", "file.c"])
    );
}

#[test]
fn extend_command_line_prepends_and_appends() {
    let argv = v(&["/nologo"]);
    assert_eq!(
        extend_command_line_from_environment(&argv, Some("/MP"), Some("file.c")),
        v(&["/MP", "/nologo", "file.c"])
    );
}

#[test]
fn expand_command_line_without_response_file_is_identity() {
    let argv = v(&["/c", "main.cpp"]);
    assert_eq!(expand_command_line(&argv).unwrap(), argv);
}

#[test]
fn expand_command_line_reads_response_file() {
    let dir = tempdir().unwrap();
    let rsp = dir.path().join("args.rsp");
    std::fs::write(&rsp, "/c main.cpp").unwrap();

    let argv = v(&[&format!("@{}", rsp.display())]);
    assert_eq!(expand_command_line(&argv).unwrap(), v(&["/c", "main.cpp"]));
}

#[test]
fn expand_command_line_missing_response_file_is_not_found() {
    let argv = v(&["@/no/such/clcache-test.rsp"]);
    let err = expand_command_line(&argv).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn expand_command_line_recurses_into_nested_response_files() {
    let dir = tempdir().unwrap();
    let inner = dir.path().join("inner.rsp");
    std::fs::write(&inner, "-DVERSION=2").unwrap();

    let outer = dir.path().join("outer.rsp");
    std::fs::write(&outer, format!("/c @{} main.cpp", inner.display())).unwrap();

    let argv = v(&[&format!("@{}", outer.display())]);
    assert_eq!(
        expand_command_line(&argv).unwrap(),
        v(&["/c", "-DVERSION=2", "main.cpp"])
    );
}

#[test]
fn response_file_utf16_le_bom_decodes() {
    let dir = tempdir().unwrap();
    let rsp = dir.path().join("utf16le.rsp");
    let mut f = std::fs::File::create(&rsp).unwrap();
    f.write_all(&[0xFF, 0xFE]).unwrap();
    for unit in "-c main.cpp".encode_utf16() {
        f.write_all(&unit.to_le_bytes()).unwrap();
    }

    let argv = v(&[&format!("@{}", rsp.display())]);
    assert_eq!(expand_command_line(&argv).unwrap(), v(&["-c", "main.cpp"]));
}

#[test]
fn response_file_utf16_be_bom_decodes() {
    let dir = tempdir().unwrap();
    let rsp = dir.path().join("utf16be.rsp");
    let mut f = std::fs::File::create(&rsp).unwrap();
    f.write_all(&[0xFE, 0xFF]).unwrap();
    for unit in "-c main.cpp".encode_utf16() {
        f.write_all(&unit.to_be_bytes()).unwrap();
    }

    let argv = v(&[&format!("@{}", rsp.display())]);
    assert_eq!(expand_command_line(&argv).unwrap(), v(&["-c", "main.cpp"]));
}

#[test]
fn response_file_utf32_le_bom_decodes() {
    let dir = tempdir().unwrap();
    let rsp = dir.path().join("utf32le.rsp");
    let mut f = std::fs::File::create(&rsp).unwrap();
    f.write_all(&[0xFF, 0xFE, 0x00, 0x00]).unwrap();
    for ch in "-c main.cpp".chars() {
        f.write_all(&(ch as u32).to_le_bytes()).unwrap();
    }

    let argv = v(&[&format!("@{}", rsp.display())]);
    assert_eq!(expand_command_line(&argv).unwrap(), v(&["-c", "main.cpp"]));
}

#[test]
fn response_file_default_utf8_without_bom() {
    let dir = tempdir().unwrap();
    let rsp = dir.path().join("plain.rsp");
    std::fs::write(&rsp, "/c main.cpp").unwrap();

    let argv = v(&[&format!("@{}", rsp.display())]);
    assert_eq!(expand_command_line(&argv).unwrap(), v(&["/c", "main.cpp"]));
}
