//! YAML module descriptions shared by tests and benches.

/// Redefinition in straight-line top-level code.
pub const STRAIGHT_LINE: &str = "
body:
  - decl: { name: x, init: { int: 1 } }
  - decl: { name: y, init: { binary: { op: '+', lhs: { ident: x }, rhs: { int: 2 } } } }
  - assign: { target: { ident: x }, value: { int: 3 } }
  - decl: { name: z, init: { ident: x } }
";

/// Two definitions meeting at a join.
pub const DIAMOND: &str = "
body:
  - function:
      name: pick
      params: [c]
      body:
        - decl: { name: x, init: { int: 0 } }
        - if:
            cond: { ident: c }
            then:
              - assign: { target: { ident: x }, value: { int: 1 } }
            else:
              - assign: { target: { ident: x }, value: { int: 2 } }
        - return: { ident: x }
";

/// Loop-carried definitions and a compound assignment.
pub const COUNTING_LOOP: &str = "
body:
  - function:
      name: count
      params: [n]
      body:
        - decl: { name: i, init: { int: 0 } }
        - decl: { name: sum, init: { int: 0 } }
        - while:
            cond: { binary: { op: '<', lhs: { ident: i }, rhs: { ident: n } } }
            body:
              - assign: { target: { ident: sum }, op: '+=', value: { ident: i } }
              - expr: { unary: { op: '++', operand: { ident: i }, postfix: true } }
        - return: { ident: sum }
";

/// `break`, `continue` and `return` inside a loop, followed by dead code.
pub const EARLY_EXIT: &str = "
body:
  - function:
      name: search
      params: [limit]
      body:
        - decl: { name: found, init: { bool: false } }
        - decl: { name: k, init: { int: 0 } }
        - while:
            cond: { bool: true }
            body:
              - if:
                  cond: { binary: { op: '>=', lhs: { ident: k }, rhs: { ident: limit } } }
                  then: [break]
              - assign: { target: { ident: k }, op: '+=', value: { int: 1 } }
              - if:
                  cond: { call: { callee: { ident: skip }, args: [{ ident: k }] } }
                  then: [continue]
              - assign: { target: { ident: found }, value: { bool: true } }
              - return: { ident: found }
              - assign: { target: { ident: found }, value: { bool: false } }
        - return: { ident: found }
";

/// A function nested in another, both shadowing a parameter name.
pub const NESTED_FUNCTIONS: &str = "
body:
  - decl: { name: g, init: { int: 1 } }
  - function:
      name: outer
      params: [a]
      body:
        - function:
            name: inner
            params: [a]
            body:
              - return: { ident: a }
        - return: { call: { callee: { ident: inner }, args: [{ ident: a }] } }
  - assign: { target: { ident: g }, value: { call: { callee: { ident: outer }, args: [{ ident: g }] } } }
";

/// Stores through a field redefine the base variable.
pub const FIELD_STORE: &str = "
body:
  - function:
      name: update
      params: [p]
      body:
        - assign: { target: { field: { base: { ident: p }, name: x } }, value: { int: 1 } }
        - return: { field: { base: { ident: p }, name: x } }
";

pub const ALL: &[(&str, &str)] = &[
    ("straight_line", STRAIGHT_LINE),
    ("diamond", DIAMOND),
    ("counting_loop", COUNTING_LOOP),
    ("early_exit", EARLY_EXIT),
    ("nested_functions", NESTED_FUNCTIONS),
    ("field_store", FIELD_STORE),
];

/// A function `nest(n)` with `depth` nested counting loops over `v0..v<depth-1>`
/// accumulating into `acc`.
///
/// # Panics
/// Panics if `depth` is 0.
pub fn nested_loops(depth: usize) -> String {
    assert!(depth > 0, "at least one loop");
    format!(
        "{{ body: [ {{ function: {{ name: nest, params: [n], body: [ \
         {{ decl: {{ name: acc, init: {{ int: 0 }} }} }}, {}, \
         {{ return: {{ ident: acc }} }} ] }} }} ] }}",
        loop_level(0, depth).join(", ")
    )
}

fn loop_level(level: usize, depth: usize) -> Vec<String> {
    if level == depth {
        return vec![format!(
            "{{ assign: {{ target: {{ ident: acc }}, op: '+=', value: {{ ident: v{} }} }} }}",
            depth - 1
        )];
    }
    let mut body = loop_level(level + 1, depth);
    body.push(format!(
        "{{ expr: {{ unary: {{ op: '++', operand: {{ ident: v{} }}, postfix: true }} }} }}",
        level
    ));
    vec![
        format!("{{ decl: {{ name: v{}, init: {{ int: 0 }} }} }}", level),
        format!(
            "{{ while: {{ cond: {{ binary: {{ op: '<', lhs: {{ ident: v{} }}, rhs: {{ ident: n }} }} }}, body: [ {} ] }} }}",
            level,
            body.join(", ")
        ),
    ]
}
