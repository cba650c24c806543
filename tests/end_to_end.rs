//! End-to-end scenarios: compile a SysY source all the way to Koopa IR
//! text and RV32 assembly, and check the shape each stage is expected
//! to have.

use sysy::back;
use sysy::front;
use sysy::front::Env;
use sysy::middle;

fn compile_ir(source: &str) -> String {
    let ast = front::parse(source).unwrap();
    let mut env = Env::new();
    front::lower(&ast, &mut env).unwrap()
}

fn compile_asm(source: &str) -> String {
    let ir = compile_ir(source);
    let raw = middle::parse(&ir).unwrap();
    back::lower_program(&raw).unwrap()
}

fn main_body(ir: &str) -> &str {
    let start = ir.find("fun @main").expect("no @main in emitted IR");
    &ir[start..]
}

#[test]
fn scenario_a_return_literal() {
    let ir = compile_ir("int main(){ return 0; }");
    let body = main_body(&ir);
    assert!(body.contains("%entry:"));
    assert!(body.contains("ret 0"));
    // Exactly one block: no other label appears after %entry.
    assert_eq!(body.matches(':').count(), 1);

    let asm = compile_asm("int main(){ return 0; }");
    assert!(asm.contains("main:"));
    assert!(asm.contains("li a0, 0"));
    assert!(asm.contains("ret"));
}

#[test]
fn scenario_b_constant_folding_is_not_required_but_arithmetic_lowers() {
    let ir = compile_ir("int main(){ return 1+2*3; }");
    let body = main_body(&ir);
    assert!(body.contains("= mul 2, 3"));
    assert!(body.contains("= add 1, "));
    assert!(body.contains("ret %"));
}

#[test]
fn scenario_c_local_variable_roundtrip() {
    let ir = compile_ir("int main(){ int a=2; a=a+3; return a; }");
    let body = main_body(&ir);
    assert!(body.contains("= alloc i32"));
    assert!(body.contains("store 2,"));
    assert!(body.contains("= load"));
    assert!(body.contains("= add"));
    assert!(body.contains("store %"));
    assert!(body.contains("ret %"));
}

#[test]
fn scenario_d_if_else_both_branches_return() {
    let ir = compile_ir("int main(){ if(1) return 1; else return 2; }");
    let body = main_body(&ir);
    assert!(body.contains("br 1,"));
    assert_eq!(body.matches("ret 1").count(), 1);
    assert_eq!(body.matches("ret 2").count(), 1);
    // Both arms terminate, so any continuation block is unreachable but
    // may still be present.
}

#[test]
fn scenario_e_while_loop_accumulator() {
    let ir = compile_ir(
        "int main(){ int s=0,i=0; while(i<10){s=s+i; i=i+1;} return s; }",
    );
    let body = main_body(&ir);
    assert!(body.contains("= lt"));
    assert!(body.matches("jump").count() >= 2);
    assert!(body.contains("br %"));
}

#[test]
fn scenario_f_function_call() {
    let ir = compile_ir("int f(int x){return x*x;} int main(){return f(6);}");
    assert!(ir.contains("fun @f(%0: i32): i32"));
    assert!(ir.contains("= call @f(6)"));
    let f_body = &ir[ir.find("fun @f").unwrap()..ir.find("fun @main").unwrap()];
    assert!(f_body.contains("= mul"));

    let asm = compile_asm("int f(int x){return x*x;} int main(){return f(6);}");
    assert!(asm.contains("call f"));
    assert!(asm.contains("f:"));
}

#[test]
fn calling_convention_overflow_arguments_use_stack() {
    // Ten int parameters: 0..7 arrive in a0..a7, 8 and 9 arrive on the
    // stack.
    let source = "int sum10(int a,int b,int c,int d,int e,int f,int g,int h,int i,int j){\
        return a+b+c+d+e+f+g+h+i+j; }\
        int main(){ return sum10(1,2,3,4,5,6,7,8,9,10); }";
    let asm = compile_asm(source);
    // The caller writes the overflow arguments to its own outgoing-argument
    // area with plain stores, not into a register.
    assert!(asm.contains("sw a7, ") || asm.contains("sw t"));
    assert!(asm.contains("call sum10"));
}

#[test]
fn scope_hygiene_shadowed_local_does_not_alias_outer() {
    let ir = compile_ir("int main(){ int a=1; { int a=2; a=3; } return a; }");
    let body = main_body(&ir);
    // Two distinct storage names are allocated for the two `a`s.
    let alloc_count = body.matches("= alloc i32").count();
    assert_eq!(alloc_count, 2);
}

#[test]
fn short_circuit_and_skips_right_operand_when_left_is_false() {
    let ir = compile_ir("int g(int x){ return x; } int main(){ return 0 && g(1); }");
    let body = main_body(&ir);

    // `br cond, then_label, else_label`: for `&&` the then-target is the
    // block that evaluates the right operand, the else-target is the
    // block that already knows the answer without calling `g`.
    let br_line = body
        .lines()
        .find(|l| l.trim_start().starts_with("br "))
        .expect("expected a branch for &&");
    let mut targets = br_line.trim().trim_start_matches("br ").splitn(3, ", ");
    targets.next().expect("malformed br: missing condition");
    let eval_right_label = targets.next().expect("malformed br: missing then-target").trim();
    let short_circuit_label = targets.next().expect("malformed br: missing else-target").trim();

    let short_circuit_pos =
        body.find(&format!("{short_circuit_label}:")).expect("short-circuit label missing");
    let eval_right_pos = body.find(&format!("{eval_right_label}:")).expect("eval-right label missing");
    let call_pos = body.find("call @g").expect("expected a lowered call to g");

    // The call can only ever be reached by falling into the eval-right
    // block; it must not appear in the short-circuit block, which lies
    // entirely between its own label and the eval-right label.
    assert!(call_pos > eval_right_pos, "call to g must live inside the right-operand block");
    assert!(
        !body[short_circuit_pos..eval_right_pos].contains("call @g"),
        "call to g leaked into the short-circuit block"
    );
}

#[test]
fn global_variable_gets_data_section_entry() {
    let source = "int counter = 5; int main(){ return counter; }";
    let ir = compile_ir(source);
    assert!(ir.contains("global @counter = alloc i32, 5"));

    let asm = compile_asm(source);
    assert!(asm.contains(".data"));
    assert!(asm.contains("counter:"));
    assert!(asm.contains(".word 5"));
}
