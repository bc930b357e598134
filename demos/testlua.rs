//! Binds a free function, a class and a nested scope, then drives them the
//! way a script would.
//!
//! ```bash
//! cargo run --example testlua
//! ```

use std::collections::BTreeMap;

use anyhow::Result;
use lualite::prelude::*;

fn testfunc(i: i64) -> BTreeMap<String, i64> {
    println!("testfunc(): {i}");
    BTreeMap::from([("bla".to_owned(), 4)])
}

struct TestClass;

impl TestClass {
    fn new(i: i64) -> Self {
        println!("TestClass::new({i})");
        TestClass
    }

    fn print(&mut self, i: i64) {
        println!("{i}");
    }

    fn print_lines(&self) -> Vec<String> {
        println!("hello world!");
        vec!["bla!!!".to_owned(); 10]
    }
}

fn test_class(smell: i64) -> ClassBuilder<TestClass> {
    ClassBuilder::new("testclass")
        .constructor(TestClass::new)
        .enum_value("smell", smell)
        .method("print", TestClass::print)
        .method("print_", TestClass::print_lines)
}

/// Push `table.key` for a global `table`.
fn lookup(state: &mut State, path: &[&str]) -> Result<()> {
    let (first, rest) = path
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty path"))?;
    state.get_global(first);
    for key in rest {
        state.get_field(-1, key)?;
        state.remove(-2);
    }
    Ok(())
}

fn construct(state: &mut State, class: &[&str], arg: i64) -> Result<()> {
    let mut path = class.to_vec();
    path.push("new");
    lookup(state, &path)?;
    call(state, Some(1), (arg,))?;
    Ok(())
}

fn call_method<A: ToScript>(state: &mut State, object: i32, name: &str, args: A) -> Result<()> {
    let object = state.abs_index(object);
    state.get_field(object, name)?;
    state.push_value(object);
    let nargs = args.to_script(state)?;
    state.call(nargs + 1, Some(1))?;
    Ok(())
}

fn main() -> Result<()> {
    let mut state = State::new();

    Module::new(&mut state)
        .class(test_class(9))
        .scope(Scope::new("subscope").class(test_class(10).function("testfunc", testfunc)))
        .enum_value("apple", 1)
        .function("testfunc", testfunc)
        .build()?;

    // local a = testfunc(3); print(a["bla"])
    let a: BTreeMap<String, i64> = call_global(&mut state, "testfunc", (3,))?;
    println!("{:?}", a.get("bla"));

    // print(apple)
    lookup(&mut state, &["apple"])?;
    println!("{:?}", state.to_integer(-1));

    // print(testclass.__classname); print(testclass.smell)
    lookup(&mut state, &["testclass", "__classname"])?;
    lookup(&mut state, &["testclass", "smell"])?;
    println!("{:?} {:?}", state.to_str(-2), state.to_integer(-1));
    state.set_top(0);

    // local b = testclass.new(1000); b:print(100); b:print_()
    construct(&mut state, &["testclass"], 1000)?;
    call_method(&mut state, 1, "print", (100,))?;
    call_method(&mut state, 1, "print_", ())?;
    state.set_top(0);

    // local a = subscope.testclass.new(1111); print(subscope.testclass.smell)
    construct(&mut state, &["subscope", "testclass"], 1111)?;
    lookup(&mut state, &["subscope", "testclass", "smell"])?;
    println!("{:?}", state.to_integer(-1));
    state.pop(1);

    // subscope.testclass.testfunc(200)
    lookup(&mut state, &["subscope", "testclass", "testfunc"])?;
    call(&mut state, Some(0), (200,))?;

    // local c = a:print_(); print(c[10])
    call_method(&mut state, 1, "print_", ())?;
    let lines = Vec::<String>::from_script(&mut state, -1)?;
    println!("{:?}", lines.get(9));

    state.set_top(0);
    let released = state.collect_garbage();
    println!("collected {released} objects");
    Ok(())
}
