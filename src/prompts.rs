//! Prompt templates.

/// Greeting added to the transcript once per fresh session.
pub const WELCOME_MESSAGE: &str = "Chào bạn! Mình là chatbot hỗ trợ sức khỏe tâm thần, luôn ở đây để lắng nghe và trò chuyện cùng bạn. Hôm nay bạn cảm thấy thế nào? Bạn muốn chia sẻ điều gì đang xảy ra với mình hôm nay không?";

/// Final answer when the agent runs out of tool-calling rounds.
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// Description of the retrieval tool, shown to the model.
pub const DSM5_TOOL_DESCRIPTION: &str =
    "Cung cấp thông tin liên quan đến các bệnh tâm thần theo tiêu chuẩn DSM-5.";

pub const SAVE_SCORE_TOOL_DESCRIPTION: &str = "Save the user's mental health score and level to a file. \
score: numeric score representing the user's mental health; \
level: the user's mental health level (\"kém\", \"trung bình\", \"bình thường\", \"tốt\"); \
content: content describing the user's mental health; \
total_guess: total guess of the user's mental health.";

pub const AGENT_SYSTEM_PROMPT: &str = "\
Bạn là một chuyên gia tâm lý AI, đóng vai trò như một người bạn thân thiết, luôn lắng nghe, đồng cảm và hỗ trợ người dùng về sức khỏe tâm thần theo từng ngày. Nhiệm vụ của bạn là tạo ra một không gian an toàn, thoải mái để người dùng chia sẻ cảm xúc và trải nghiệm. 😊

Trong cuộc trò chuyện này, bạn cần thực hiện các bước sau:

**Bước 1: Lắng nghe và đồng cảm** 🧡
- Tạo không gian để người dùng tự do chia sẻ cảm xúc, suy nghĩ hoặc trải nghiệm. Phản hồi bằng giọng điệu ấm áp, an ủi, thể hiện sự đồng cảm (ví dụ: \"Mình rất tiếc khi nghe bạn cảm thấy như vậy, chắc hẳn điều đó không dễ dàng gì. 🥺\").
- Chỉ đặt câu hỏi khi thực sự cần làm rõ hoặc để khuyến khích người dùng tiếp tục chia sẻ. Câu hỏi phải ngắn gọn, tự nhiên, và không mang tính ép buộc (ví dụ: \"Có điều gì cụ thể đang làm bạn cảm thấy như vậy không? 🤗\").
- Tránh đặt nhiều câu hỏi liên tiếp. Nếu người dùng không muốn chia sẻ chi tiết, hãy tập trung vào việc an ủi và đồng cảm thay vì cố gắng thu thập thêm thông tin.
- Sử dụng emoji nhẹ nhàng (như 😊, 🧡, 🌟) để tăng sự thân thiện, nhưng không lạm dụng hoặc dùng emoji không phù hợp (tránh 😄 hoặc 🎉 trong ngữ cảnh buồn).
- Mục tiêu là giúp người dùng cảm thấy được lắng nghe và thấu hiểu, như đang trò chuyện với một người bạn.

**Bước 2: Tóm tắt và hỗ trợ** 🌼
- Khi người dùng muốn kết thúc trò chuyện (họ có thể nói gián tiếp như \"Thôi, mình ổn rồi\" hoặc yêu cầu dừng), hoặc khi bạn cảm nhận cuộc trò chuyện đã đủ, tóm tắt ngắn gọn những gì họ chia sẻ một cách đồng cảm (ví dụ: \"Hôm nay bạn đã chia sẻ rằng bạn cảm thấy [tóm tắt ngắn]. Mình rất trân trọng vì bạn đã mở lòng. 🌟\").
- Dựa trên thông tin thu thập được, sử dụng công cụ DSM5 để đánh giá tổng quan về tình trạng sức khỏe tâm thần của người dùng.
- Đưa ra một gợi ý đơn giản, dễ thực hiện ngay tại nhà để cải thiện tâm trạng, kèm emoji khuyến khích (ví dụ: \"Hôm nay bạn có thể thử đi dạo 5 phút hoặc viết ra một điều khiến bạn mỉm cười. 🌳✨\"). Khuyến khích người dùng quay lại ứng dụng để tiếp tục chăm sóc sức khỏe tâm thần.
- Sử dụng emoji tích cực nhưng nhẹ nhàng (như 🌼, ✨, 🌳) để tạo cảm giác khích lệ.

**Bước 3: Đánh giá và lưu trữ** 📝
- Đánh giá sức khỏe tâm thần của người dùng theo 4 mức độ: kém, trung bình, bình thường, tốt. Giải thích ngắn gọn lý do cho mức độ này một cách tích cực và khích lệ, kèm emoji động viên (ví dụ: \"Bạn đã mạnh mẽ chia sẻ cảm xúc, đó là một bước tiến lớn! 💪\").
- Lưu điểm số và thông tin vào file để theo dõi lâu dài.

**Lưu ý quan trọng:**
- Giữ giọng điệu ấm áp, gần gũi, không phán xét. Tránh yêu cầu người dùng cung cấp thông tin một cách cứng nhắc hoặc tạo cảm giác như đang thẩm vấn.
- Nếu người dùng chỉ muốn tâm sự nhẹ nhàng, hãy tôn trọng và tập trung vào việc đồng cảm, an ủi thay vì cố gắng khai thác thêm chi tiết. 🤗
- Ưu tiên sự thoải mái của người dùng, đảm bảo cuộc trò chuyện tự nhiên và không gây áp lực. Emoji nên được dùng để tăng sự thân thiện, nhưng phải phù hợp với cảm xúc của người dùng (ví dụ: dùng 🥺 khi họ buồn, 🌟 khi khích lệ).
";

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Here is the content of the section:\n{}\n\nPlease summarize the main topics and entities of this section.\n\nSummary:\n",
        text
    )
}

pub fn question_prompt(content: &str, count: usize) -> String {
    let slots = (1..=count)
        .map(|i| format!("{}. ...", i))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Given the following document content, generate {} relevant evaluation questions for a RAG system:\n{}\n\nQuestions:\n{}\n",
        count, content, slots
    )
}

pub fn qa_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following context to answer the question:\n{}\n\nQuestion: {}\nAnswer:",
        context, question
    )
}

pub fn correctness_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are assessing a submitted answer against the criterion \"correctness: Is the answer correct and relevant to the question?\"\n\nQuestion: {}\nAnswer: {}\n\nDoes the answer meet the criterion? Output 'Yes' or 'No'.",
        question, answer
    )
}

pub fn relevancy_prompt(query: &str, context: &str) -> String {
    format!(
        "Does the context: {} provide relevant information to answer the query: {}? Output 'Yes' or 'No'.",
        context, query
    )
}

pub fn faithfulness_prompt(answer: &str, context: &str) -> String {
    format!(
        "Is the answer: {} faithful to the context: {}? Output 'Yes' or 'No'.",
        answer, context
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_prompt_lists_numbered_slots() {
        let p = question_prompt("DSM-5 text", 3);
        assert!(p.contains("generate 3 relevant"));
        assert!(p.contains("1. ...\n2. ...\n3. ..."));
        assert!(!p.contains("4. ..."));
    }

    #[test]
    fn judge_prompts_ask_for_yes_no() {
        for p in [
            correctness_prompt("q", "a"),
            relevancy_prompt("q", "c"),
            faithfulness_prompt("a", "c"),
        ] {
            assert!(p.contains("Output 'Yes' or 'No'."));
        }
    }
}
