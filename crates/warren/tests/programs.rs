//! End-to-end programs: source text in, observable output or value out.

use pretty_assertions::assert_eq;
use warren::{CollectPrint, ErrorKind, Runtime, ValueKind};

fn run_output(source: &str) -> String {
    let sink = CollectPrint::new();
    let mut rt = Runtime::with_print(Box::new(sink.clone()));
    let result = rt.exec(source).unwrap();
    rt.release_value(result);
    sink.output()
}

#[test]
fn print_joins_arguments_with_spaces() {
    assert_eq!(run_output("io.print(1, 2, 3)"), "1 2 3\n");
}

#[test]
fn user_functions_coalesce_positional_arguments() {
    assert_eq!(
        run_output("add: (x, y) -> (+(x, y)), io.print(add(2, 40))"),
        "42\n"
    );
}

#[test]
fn extended_objects_carry_their_methods() {
    assert_eq!(
        run_output(
            "p: Object.extend({greet: (name) -> (io.print(\"hi\", name))}), p.greet(\"world\")"
        ),
        "hi world\n"
    );
}

#[test]
fn while_loops_until_the_test_is_false() {
    assert_eq!(
        run_output("x: 0, while(`(<(x, 3)), `(x: +(x, 1))), io.print(x)"),
        "3\n"
    );
}

#[test]
fn cond_selects_the_first_truthy_pair() {
    let mut rt = Runtime::new();
    let result = rt
        .exec("cond((=(1, 2), \"a\"), (=(1, 1), \"b\"), (true, \"c\"))")
        .unwrap();
    let id = result.expect("cond should produce a value");
    assert_eq!(rt.string_value(id), Some("b"));
    rt.release_value(result);
}

#[test]
fn foreach_visits_elements_in_order() {
    assert_eq!(
        run_output("l: (1, 2, 3), List.foreach(l, (v) -> (io.print(v)))"),
        "1\n2\n3\n"
    );
}

#[test]
fn empty_program_produces_nothing() {
    let mut rt = Runtime::new();
    let result = rt.exec("").unwrap();
    assert!(result.is_none());
    assert_eq!(run_output(""), "");
}

#[test]
fn empty_list_is_a_zero_length_list() {
    let mut rt = Runtime::new();
    let result = rt.exec("()").unwrap();
    let id = result.expect("a list value");
    assert_eq!(rt.value_kind(id), ValueKind::List);
    assert_eq!(rt.list_len(id), Some(0));
    rt.release_value(result);
}

#[test]
fn duplicated_hash_key_keeps_the_last_value() {
    let mut rt = Runtime::new();
    let result = rt.exec("{a: 1, a: 2}").unwrap();
    let id = result.expect("a hash value");
    assert_eq!(rt.format_value(Some(id)), "{a: 2}");
    rt.release_value(result);
}

#[test]
fn prototype_cycles_do_not_hang_lookup() {
    let mut rt = Runtime::new();
    let err = rt
        .exec(
            "a: Object.extend({}), b: Object.extend({}), \
             a.__parent__: b, b.__parent__: a, a.missing",
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn closures_capture_their_defining_environment() {
    assert_eq!(
        run_output("adder: (n) -> ((x) -> (+(x, n))), add5: adder(5), io.print(add5(37))"),
        "42\n"
    );
}

#[test]
fn inherited_methods_bind_self_to_the_receiver() {
    assert_eq!(
        run_output(
            "proto: Object.extend({x: 42, getx: () -> (self.x)}), \
             o: proto.extend({}), io.print(o.getx(), o.getx())"
        ),
        "42 42\n"
    );
}

#[test]
fn defaults_fill_missing_arguments() {
    assert_eq!(
        run_output(
            "greet: (name, greeting: \"hi\") -> (io.print(greeting, name)), \
             greet(\"bob\"), greet(name: \"ann\", greeting: \"yo\")"
        ),
        "hi bob\nyo ann\n"
    );
}

#[test]
fn hash_form_invocations_bind_arguments_by_name() {
    assert_eq!(
        run_output("g: (x, y: 2) -> (+(x, y)), io.print(g{x: 40})"),
        "42\n"
    );
}

#[test]
fn a_parameter_with_no_binding_and_no_default_is_an_arity_error() {
    let mut rt = Runtime::new();
    let err = rt.exec("f: (x) -> (x), f()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arity);
}

#[test]
fn logic_builtins_return_numbers() {
    assert_eq!(
        run_output("io.print(and(1, 1), or(0, 0), not(0), xor(1, 0))"),
        "1 0 1 1\n"
    );
}

#[test]
fn and_short_circuits_deferred_arguments() {
    // The second argument would blow up if evaluated.
    assert_eq!(
        run_output("io.print(and(0, `(missing_property)))"),
        "0\n"
    );
}

#[test]
fn while_yields_the_last_body_result() {
    assert_eq!(
        run_output("x: 0, r: while(`(<(x, 2)), `(x: +(x, 1))), io.print(r)"),
        "2\n"
    );
}

#[test]
fn while_requires_deferred_arguments() {
    let mut rt = Runtime::new();
    let err = rt.exec("while(1, 2)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn subtraction_negates_a_single_argument() {
    assert_eq!(run_output("io.print(-(5), -(10, 3, 2))"), "-5 5\n");
}

#[test]
fn list_methods_dispatch_through_the_prototype() {
    assert_eq!(
        run_output("l: List.clone(), l.push(1), l.push(2), io.print(l.length(), l.pop(), l.length())"),
        "2 2 1\n"
    );
}

#[test]
fn eachpair_shadows_ancestor_members() {
    assert_eq!(
        run_output(
            "base: Object.extend({a: 1, b: 2}), child: base.extend({a: 10}), \
             child.eachpair((k, v) -> (cond((=(k, \"a\"), `(io.print(k, v))), \
                                            (=(k, \"b\"), `(io.print(k, v))))))"
        ),
        "a 10\nb 2\n"
    );
}

#[test]
fn string_methods_work_on_string_values() {
    assert_eq!(
        run_output("s: \"war\", io.print(s.concat(\"ren\"), s.length())"),
        "warren 3\n"
    );
}

#[test]
fn explicit_fn_builds_a_callable() {
    assert_eq!(
        run_output("twice: fn((\"x\"), `((+(x, x)))), io.print(twice(21))"),
        "42\n"
    );
}

#[test]
fn absent_property_is_a_lookup_error() {
    let mut rt = Runtime::new();
    let err = rt.exec("definitely_not_here").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn property_set_on_a_number_is_an_invariant_violation() {
    let mut rt = Runtime::new();
    let err = rt.exec("n: 5, n.x: 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invariant);
}

#[test]
fn calling_a_number_is_a_type_mismatch() {
    let mut rt = Runtime::new();
    let err = rt.exec("n: 5, n(1)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn truthiness_of_strings_is_case_insensitive_true() {
    let mut rt = Runtime::new();
    let result = rt.exec("cond((\"TRUE\", 1), (true, 2))").unwrap();
    let id = result.expect("a number");
    assert_eq!(rt.number_value(id), Some(1));
    rt.release_value(result);
}

#[test]
fn primitive_subset_round_trips_through_format() {
    let mut rt = Runtime::new();
    for source in ["42", "\"hi\"", "(1, 2, 3)", "{a: 1, b: \"x\"}", "(1, (2, 3), \"y\")"] {
        let result = rt.exec(source).unwrap();
        let rendered = rt.format_value(result);
        assert_eq!(rendered, source, "formatting `{source}`");
        // Parsing the rendering again produces the same text.
        let again = rt.exec(&rendered).unwrap();
        assert_eq!(rt.format_value(again), source);
        rt.release_value(again);
        rt.release_value(result);
    }
}

#[test]
fn assignment_yields_the_stored_value() {
    let mut rt = Runtime::new();
    let result = rt.exec("x: 5").unwrap();
    let id = result.expect("a number");
    assert_eq!(rt.number_value(id), Some(5));
    rt.release_value(result);
}

#[test]
fn nested_dotted_assignment_reaches_the_inner_hash() {
    assert_eq!(
        run_output("o: Object.extend({inner: {n: 1}}), o.inner.n: 7, io.print(o.inner.n)"),
        "7\n"
    );
}
