use faststr::FastStr;

const INSTRUCTIONS: &str = "\
Generate JavaScript code for a data processor with:
- At least 50 lines
- At least 1250 characters
- Multiple functions
- Error handling
- Streaming/data processing logic
Return ONLY JavaScript code.";

/// Builds the user message sent upstream. With `wrap` set the caller's text
/// becomes the topic of a fixed code-generation instruction block.
pub fn build_prompt(input: &str, wrap: bool) -> FastStr {
    if !wrap {
        return input.to_owned().into();
    }
    format!("\n{INSTRUCTIONS}\n\nTopic: {input}\n").into()
}
