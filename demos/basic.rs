use mutequiv::*;
use std::sync::Arc;

fn main() -> Result<(), MutequivError> {
    // 1. A compiled unit with two methods
    let empty_names = Location::new("com/example/Repo", "names", "()Ljava/util/List;");
    let lookup = Location::new("com/example/Repo", "lookup", "(I)Ljava/lang/Object;");
    let unit = Arc::new(ClassTree::new(
        "com/example/Repo",
        vec![
            MethodTree::new(
                empty_names.clone(),
                InstructionStream::new(vec![
                    Instruction::invoke_static("java/util/Collections", "emptyList", "()Ljava/util/List;"),
                    Instruction::store(Opcode::Astore, 1),
                    Instruction::Label(0),
                    Instruction::load(Opcode::Aload, 1),
                    Instruction::op(Opcode::Areturn),
                ]),
            ),
            MethodTree::new(
                lookup.clone(),
                InstructionStream::new(vec![
                    Instruction::load(Opcode::Aload, 0),
                    Instruction::load(Opcode::Iload, 1),
                    Instruction::invoke(Opcode::Invokevirtual, "com/example/Repo", "find", "(I)Ljava/lang/Object;"),
                    Instruction::op(Opcode::Areturn),
                ]),
            ),
        ],
    ));

    // 2. Mutations proposed by the return-value mutators
    let batch = vec![
        MutationDescriptor::new(EMPTY_RETURNS, empty_names.clone(), 4).with_line(12),
        MutationDescriptor::new(NULL_RETURNS, empty_names, 4).with_line(12),
        MutationDescriptor::new(NULL_RETURNS, lookup.clone(), 3).with_line(20),
        MutationDescriptor::new(EMPTY_RETURNS, lookup, 3).with_line(20),
    ];

    // 3. Select features and build the filter chain
    let factory = EquivalentReturnMutationFilter::new()?;
    let settings = FeatureParser::parse_all("+FRETEQUIV")?;
    let factories: [&dyn MutationInterceptorFactory; 1] = [&factory];
    let mut filter = FeatureSelector::new(settings).create_interceptors(&factories)?;
    println!("{}: {}", factory.provides().name(), factory.provides().description());

    // 4. Filter one unit
    filter.begin(&unit);
    let kept = filter.intercept(batch)?;
    filter.end();

    for m in &kept {
        println!("kept {}", m);
    }
    Ok(())
}
