// Prompt texts shared by the terminal and browser front ends

/// Placeholder in [`SYSTEM_PROMPT`] replaced by the retrieved plots
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const SYSTEM_PROMPT: &str = concat!(
    "You are a movie buff assistant who can answer questions about movies, make suggestions, summarise key facts, and provide other useful movie information.",
    "Use the following movie(s) context that and any previous chat history to answer the user's questions.",
    "If you are unsure, just say \"I'm unsure\". Only discuss movies from the context provided. Provide a succinct follow up prompt.  Don't discuss other topics not related to the movies.",
    "\n\n",
    "{context}",
);

/// Instructs the model to rewrite a follow-up into a self-contained question
pub const CONTEXTUALIZE_PROMPT: &str = concat!(
    "Given a chat history and the latest user question ",
    "which might reference context in the chat history, ",
    "formulate a standalone question which can be understood ",
    "without the chat history. Do NOT answer the question, ",
    "just reformulate it if needed and otherwise return it as is.",
);

pub const WELCOME_MESSAGE: &str = concat!(
    "Welcome to the Movie Chatbot!",
    "Ask me anything about movies, and I'll do my best to help you out.",
    " Type 'q' to start a new conversation.",
);

pub const INPUT_PROMPT: &str = "What's your question about movie(s)? ";

/// Placeholder text of the browser chat input
pub const WEB_INPUT_PLACEHOLDER: &str =
    "Ask your questions about movies or type 'q' to start a new conversation.";

pub const BANNER: &str = r"
#     #                                          #####
##   ##   ####   #    #     #    ######         #     #  #    #    ##     #####
# # # #  #    #  #    #     #    #              #        #    #   #  #      #
#  #  #  #    #  #    #     #    #####          #        ######  #    #     #
#     #  #    #  #    #     #    #              #        #    #  ######     #
#     #  #    #   #  #      #    #              #     #  #    #  #    #     #
#     #   ####     ##       #    ######          #####   #    #  #    #     #
";

/// System prompt with the retrieved context filled in
#[inline]
pub fn system_prompt(context: &str) -> String {
    SYSTEM_PROMPT.replace(CONTEXT_PLACEHOLDER, context)
}
