use ember::{api, Environment, FfiItem, Result, Value};

#[derive(Clone, Copy, Debug)]
struct MyVec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl MyVec3 {
    fn from_value(env: &Environment, value: Value) -> Result<Self> {
        Ok(Self {
            x: env.dict_get(value, "x")?.as_number()?,
            y: env.dict_get(value, "y")?.as_number()?,
            z: env.dict_get(value, "z")?.as_number()?,
        })
    }

    fn to_value(self, env: &mut Environment) -> Result<Value> {
        let mut scope = env.roots();
        let dict = scope.make_empty_dict()?;
        let slot = scope.pin(dict)?;
        for (key, x) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            let dict = scope.get(slot)?;
            scope.dict_set(dict, key, Value::Float(x))?;
        }
        scope.get(slot)
    }
}

fn vec3_new(env: &mut Environment) -> Result<()> {
    let v = MyVec3 {
        x: env.arg_number(0)?,
        y: env.arg_number(1)?,
        z: env.arg_number(2)?,
    };
    let value = v.to_value(env)?;
    env.set_return(value)
}

fn vec3_add(env: &mut Environment) -> Result<()> {
    let (a, b) = (env.arg_dict(0)?, env.arg_dict(1)?);
    let a = MyVec3::from_value(env, a)?;
    let b = MyVec3::from_value(env, b)?;
    let sum = MyVec3 {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    };
    let value = sum.to_value(env)?;
    env.set_return(value)
}

fn vec3_sum(env: &mut Environment) -> Result<()> {
    let v = env.arg_dict(0)?;
    let v = MyVec3::from_value(env, v)?;
    env.set_return_float(v.x + v.y + v.z)
}

const VEC3: &[FfiItem] = &[
    FfiItem::new("__Vec3_new", "new", &["x", "y", "z"], vec3_new),
    FfiItem::new("__Vec3_add", "add", &["a", "b"], vec3_add),
    FfiItem::new("__Vec3_sum", "sum", &["v"], vec3_sum),
];

fn main() -> Result<()> {
    let mut env = Environment::new();
    api::register_all(&mut env)?;
    let vec3 = env.register_functions("Vec3", VEC3)?;

    let new = env.dict_get(vec3, "new")?;
    let one = env.call_value(new, &[Value::Float(1.0), Value::Float(1.0), Value::Float(1.0)])?;
    let one = env.root(one);
    let two = env.call("__Vec3_add", &[one.value(), one.value()])?;
    env.call("__Console_print", &[two])?;

    let sum = env.call("__Vec3_sum", &[two])?;
    println!("{:?}", MyVec3::from_value(&env, two)?);
    println!("sum = {}", env.render(sum)?);
    Ok(())
}
