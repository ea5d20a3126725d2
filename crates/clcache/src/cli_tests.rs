use super::*;

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn recognizes_each_administrative_flag() {
    assert_eq!(
        parse_argv(&argv(&["-s"])),
        Ok(Invocation::Admin(AdminCommand::Stats))
    );
    assert_eq!(
        parse_argv(&argv(&["-c"])),
        Ok(Invocation::Admin(AdminCommand::Clean))
    );
    assert_eq!(
        parse_argv(&argv(&["-C"])),
        Ok(Invocation::Admin(AdminCommand::ClearAll))
    );
    assert_eq!(
        parse_argv(&argv(&["-z"])),
        Ok(Invocation::Admin(AdminCommand::Reset))
    );
    assert_eq!(
        parse_argv(&argv(&["--help"])),
        Ok(Invocation::Admin(AdminCommand::Help))
    );
}

#[test]
fn set_max_size_parses_its_integer_argument() {
    assert_eq!(
        parse_argv(&argv(&["-M", "2048"])),
        Ok(Invocation::Admin(AdminCommand::SetMaxSize(2048)))
    );
}

#[test]
fn set_max_size_rejects_non_numeric_argument() {
    assert!(parse_argv(&argv(&["-M", "abc"])).is_err());
}

#[test]
fn set_max_size_rejects_zero() {
    assert!(parse_argv(&argv(&["-M", "0"])).is_err());
}

#[test]
fn set_max_size_requires_an_argument() {
    assert!(parse_argv(&argv(&["-M"])).is_err());
}

#[test]
fn anything_else_is_treated_as_a_compile_request() {
    let request = argv(&["/nologo", "/EHsc", "/c", "hit.cpp", "/Fohit.obj"]);
    assert_eq!(
        parse_argv(&request),
        Ok(Invocation::Compile(request.clone()))
    );
}

#[test]
fn a_compiler_flag_that_collides_with_an_administrative_flag_name_needs_no_escaping() {
    // "-c" alone is CompileArgs::Clean, but clcache never sees that flag in
    // isolation from a real build: there's always at least a source file
    // alongside it, so the length check is what disambiguates.
    let request = argv(&["-c", "hit.cpp"]);
    assert_eq!(
        parse_argv(&request),
        Ok(Invocation::Compile(request.clone()))
    );
}

#[test]
fn help_is_only_recognized_when_it_is_the_sole_argument() {
    let request = argv(&["--help", "hit.cpp"]);
    assert_eq!(
        parse_argv(&request),
        Ok(Invocation::Compile(request.clone()))
    );
}
